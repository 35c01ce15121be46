pub mod config;
pub mod preset;

pub mod phase0 {
    pub mod consts;
    pub mod containers;
    pub mod primitives;

    mod container_impls;
}

pub mod altair {
    pub mod consts;
    pub mod containers;
    pub mod primitives;
}
