use fail::FailScenario;

/// Configures failpoints for the duration of a test and turns them off on drop.
pub struct CustomFailScenario<'a> {
    _scenario: FailScenario<'a>,
    failpoints: Vec<String>,
}

impl<'a> CustomFailScenario<'a> {
    /// Sets each `(name, action)` pair, e.g. `("schema_swap.after_tables", "return")`.
    pub fn setup(failpoints: &[(&str, &str)]) -> CustomFailScenario<'a> {
        let scenario = FailScenario::setup();

        for (name, action) in failpoints {
            fail::cfg(*name, action).unwrap();
        }

        Self {
            _scenario: scenario,
            failpoints: failpoints
                .iter()
                .map(|(name, _)| name.to_string())
                .collect(),
        }
    }
}

impl Drop for CustomFailScenario<'_> {
    fn drop(&mut self) {
        for name in &self.failpoints {
            fail::remove(name);
        }
    }
}
