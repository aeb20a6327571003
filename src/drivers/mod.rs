pub mod hcsr04;
pub mod l298n;
