mod test_batch;
mod test_get;
