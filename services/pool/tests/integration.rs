mod helpers;
mod concurrency_test;
