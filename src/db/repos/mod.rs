mod policies;

pub use policies::PolicyRepo;
