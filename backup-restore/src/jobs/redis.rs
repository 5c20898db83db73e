use std::collections::HashMap;

use fred::prelude::{HashesInterface, ListInterface, SetsInterface, SortedSetsInterface};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::br_error;
use crate::error::{BrResult, ErrorKind};
use crate::jobs::base::{Job, JobRegistry, JobSet};
use crate::redis::RedisClient;

/// Set of worker process identities.
const PROCESSES_KEY: &str = "processes";
/// Set of queue names.
const QUEUES_KEY: &str = "queues";
const RETRY_KEY: &str = "retry";
const SCHEDULE_KEY: &str = "schedule";
const DEAD_KEY: &str = "dead";

/// Suffixes of the per-process hashes describing executing jobs.
///
/// Older worker versions write `{process}:workers`, newer ones `{process}:work`.
const WORK_HASH_SUFFIXES: [&str; 2] = ["workers", "work"];

/// Entry of a per-process work hash describing one executing job.
#[derive(Debug, Deserialize)]
struct WorkEntry {
    #[serde(default)]
    queue: Option<String>,
    payload: Value,
}

/// [`JobRegistry`] reading the conventional Redis worker layout.
///
/// Executing jobs live in the `{process}:workers` or `{process}:work` hashes of the
/// processes listed in the `processes` set. Pending jobs live in `queue:{name}` lists,
/// and failed or delayed jobs in the `retry`, `schedule` and `dead` sorted sets.
#[derive(Clone)]
pub struct RedisJobRegistry {
    client: RedisClient,
}

impl RedisJobRegistry {
    pub fn new(client: RedisClient) -> Self {
        Self { client }
    }

    async fn raw_members(&self, set: &JobSet) -> BrResult<Vec<String>> {
        let pool = self.client.pool();

        let members: Vec<String> = match set {
            JobSet::Queue(name) => pool.lrange(queue_key(name), 0, -1).await?,
            JobSet::Retry => pool.zrange(RETRY_KEY, 0, -1, None, false, None, false).await?,
            JobSet::Scheduled => {
                pool.zrange(SCHEDULE_KEY, 0, -1, None, false, None, false)
                    .await?
            }
            JobSet::Dead => pool.zrange(DEAD_KEY, 0, -1, None, false, None, false).await?,
        };

        Ok(members)
    }
}

impl JobRegistry for RedisJobRegistry {
    async fn running_jobs(&self) -> BrResult<Vec<Job>> {
        let pool = self.client.pool();
        let processes: Vec<String> = pool.smembers(PROCESSES_KEY).await?;

        let mut jobs = Vec::new();
        for process in processes {
            for key in work_hash_keys(&process) {
                let work: HashMap<String, String> = pool.hgetall(key).await?;
                jobs.extend(executing_jobs(&process, work));
            }
        }

        Ok(jobs)
    }

    async fn queue_names(&self) -> BrResult<Vec<String>> {
        let mut names: Vec<String> = self.client.pool().smembers(QUEUES_KEY).await?;
        names.sort();

        Ok(names)
    }

    async fn jobs(&self, set: &JobSet) -> BrResult<Vec<Job>> {
        let mut jobs = Vec::new();
        for raw in self.raw_members(set).await? {
            match parse_member(raw) {
                Ok(job) => jobs.push(job),
                Err(err) => warn!(%set, error = %err, "skipping unreadable job"),
            }
        }

        Ok(jobs)
    }

    /// Removes the member `job` was read from.
    ///
    /// Jobs not read through [`JobRegistry::jobs`] have no member attached and are looked
    /// up by id.
    async fn delete_job(&self, set: &JobSet, job: &Job) -> BrResult<bool> {
        let raw = match &job.raw {
            Some(raw) => raw.clone(),
            None => {
                let found = self.raw_members(set).await?.into_iter().find(|raw| {
                    serde_json::from_str::<Job>(raw)
                        .map(|candidate| candidate.id == job.id)
                        .unwrap_or(false)
                });

                match found {
                    Some(raw) => raw,
                    None => return Ok(false),
                }
            }
        };

        let pool = self.client.pool();
        let removed: i64 = match set {
            JobSet::Queue(name) => pool.lrem(queue_key(name), 1, raw).await?,
            JobSet::Retry => pool.zrem(RETRY_KEY, raw).await?,
            JobSet::Scheduled => pool.zrem(SCHEDULE_KEY, raw).await?,
            JobSet::Dead => pool.zrem(DEAD_KEY, raw).await?,
        };

        Ok(removed > 0)
    }
}

fn queue_key(name: &str) -> String {
    format!("queue:{name}")
}

fn work_hash_keys(process: &str) -> [String; 2] {
    WORK_HASH_SUFFIXES.map(|suffix| format!("{process}:{suffix}"))
}

/// Converts the entries of one work hash into jobs.
fn executing_jobs(process: &str, work: HashMap<String, String>) -> Vec<Job> {
    work.into_iter()
        .map(|(thread, raw)| match parse_work_entry(&raw) {
            Ok(job) => job,
            Err(err) => {
                // An unreadable entry is still an executing job.
                warn!(%process, %thread, error = %err, "unreadable work entry");
                Job {
                    id: format!("{process}:{thread}"),
                    class: String::new(),
                    queue: None,
                    args: Vec::new(),
                    raw: None,
                }
            }
        })
        .collect()
}

/// Parses a queue or sorted set member, keeping the member for deletion.
fn parse_member(raw: String) -> BrResult<Job> {
    let mut job: Job = serde_json::from_str(&raw)?;
    job.raw = Some(raw);

    Ok(job)
}

/// Parses a work entry whose payload is either a JSON object or a JSON encoded string.
fn parse_work_entry(raw: &str) -> BrResult<Job> {
    let entry: WorkEntry = serde_json::from_str(raw)?;

    let mut job: Job = match entry.payload {
        Value::String(payload) => serde_json::from_str(&payload)?,
        payload @ Value::Object(_) => serde_json::from_value(payload)?,
        other => {
            return Err(br_error!(
                ErrorKind::JobRegistryFailed,
                "Work entry payload is not a job",
                other.to_string()
            ));
        }
    };

    if job.queue.is_none() {
        job.queue = entry.queue;
    }

    Ok(job)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_string_and_object_payloads() {
        let encoded = r#"{"queue":"default","run_at":1,"payload":"{\"class\":\"Jobs::ProcessPost\",\"jid\":\"a\",\"args\":[{\"current_tenant_id\":\"default\"}]}"}"#;
        let inline = r#"{"queue":"low","payload":{"class":"Jobs::Heartbeat","jid":"b","args":[{"all_tenants":true}]}}"#;

        let encoded = parse_work_entry(encoded).unwrap();
        let inline = parse_work_entry(inline).unwrap();

        assert_eq!(encoded.id, "a");
        assert_eq!(encoded.queue.as_deref(), Some("default"));
        assert_eq!(encoded.tenant_tag(), Some("default"));
        assert!(inline.is_for_all_tenants());
        assert_eq!(inline.queue.as_deref(), Some("low"));
    }

    #[test]
    fn reads_both_work_hash_layouts() {
        assert_eq!(
            work_hash_keys("localhost:7890"),
            ["localhost:7890:workers", "localhost:7890:work"]
        );
    }

    #[test]
    fn work_hash_entries_become_executing_jobs() {
        let work = HashMap::from([
            (
                "444".to_string(),
                r#"{"queue":"default","run_at":1700000000,"payload":"{\"class\":\"Jobs::ProcessPost\",\"jid\":\"c\",\"args\":[{\"post_id\":1,\"current_tenant_id\":\"default\"}]}"}"#
                    .to_string(),
            ),
            ("445".to_string(), "not json".to_string()),
        ]);

        let mut jobs = executing_jobs("localhost:7890", work);
        jobs.sort_by(|a, b| a.id.cmp(&b.id));

        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].id, "c");
        assert_eq!(jobs[0].tenant_tag(), Some("default"));
        // Unreadable entries count as untagged, so they block every tenant.
        assert_eq!(jobs[1].id, "localhost:7890:445");
        assert_eq!(jobs[1].tenant_tag(), None);
    }

    #[test]
    fn members_keep_their_exact_encoding() {
        let raw = r#"{"retry":true,"class":"Jobs::ProcessPost","jid":"d","args":[{"current_tenant_id":"default"}],"error_message":"boom"}"#;

        let job = parse_member(raw.to_string()).unwrap();

        assert_eq!(job.id, "d");
        assert_eq!(job.raw.as_deref(), Some(raw));
        assert!(parse_member("[]".to_string()).is_err());
    }

    #[test]
    fn rejects_non_job_payloads() {
        let err = parse_work_entry(r#"{"payload":42}"#).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::JobRegistryFailed);
    }
}
