pub mod gcd;
pub mod read;
pub mod record;
pub mod selftest;
