pub mod explainer;
pub mod llm_provider;
