pub mod codec;
pub mod error;
pub mod math;
pub mod model;
pub mod validation;

pub use codec::{
    decode_binary, decode_json, encode_binary, encode_json, load_model, save_model_binary,
    save_model_json, SgeFormatVersion, SGE_VERSION_FLAT, SGE_VERSION_NESTED,
};
pub use error::{Result, SgeError};
pub use model::{SgeHeader, SgeModel, SgeModelType, MODEL_SCALE};
