#[macro_use]
pub(crate) mod feature_cfg;
