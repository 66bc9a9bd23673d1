pub mod location;

#[cfg(test)]
pub mod test_utils;
