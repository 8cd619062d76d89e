mod test_utils;

mod capacity;

mod multi_node;

mod pairing;
