mod test_partition;
mod test_reader;
