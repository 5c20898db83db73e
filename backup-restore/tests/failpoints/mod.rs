mod operation_test;
mod schema_swap_test;
