mod policies;

pub use policies::SqlitePolicyRepo;
