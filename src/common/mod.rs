pub mod checksum;
pub mod clock;
pub mod limits;
pub mod sample;
