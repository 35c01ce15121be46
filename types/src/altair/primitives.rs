pub type SubcommitteeIndex = u64;
