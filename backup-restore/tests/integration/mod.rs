mod schema_swap_test;
