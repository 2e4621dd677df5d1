pub mod code_gen;

pub use code_gen::{
    CodeGenerator, DEFAULT_CODE_LENGTH, DEFAULT_MAX_ATTEMPTS, MAX_CODE_LENGTH, MIN_CODE_LENGTH,
    candidate_code, content_hash, validate_alias,
};
