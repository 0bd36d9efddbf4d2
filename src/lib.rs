pub mod config;
pub mod error;
pub mod inventory;
pub mod logger;
pub mod persistence;

#[cfg(test)]
#[ctor::ctor]
fn init_test_logger() {
    logger::init_logger(true);
}
