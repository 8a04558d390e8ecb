pub mod assembler; // Builds the final answer
pub mod classifier; // ONNX model + softmax
pub mod database; // Nutrition reference store
pub mod preprocessor; // Image decode/resize/normalize

pub use assembler::ResponseAssembler;
pub use classifier::{ClassifierEngine, OnnxModel};
pub use database::{Database, NutritionRepository};
pub use preprocessor::ImagePreprocessor;
