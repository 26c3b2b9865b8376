pub mod token;
pub mod tokenizer;
pub mod normalizer;
