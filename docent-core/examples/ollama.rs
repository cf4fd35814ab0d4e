use docent_core::{Config, OllamaProvider, Provider};

#[tokio::main]
async fn main() {
    println!("Checking the Ollama backend");

    let config = match Config::load_or_default() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config.yaml: {}", e);
            return;
        }
    };
    println!("Model: {}", config.llm.model);
    println!("Embedding model: {}", config.llm.embedding_model);
    println!("Base URL: {}", config.llm.base_url);

    let provider = match OllamaProvider::new(&config.llm) {
        Ok(provider) => provider,
        Err(e) => {
            eprintln!("Failed to create provider: {}", e);
            return;
        }
    };

    match provider.embed("Hi there!").await {
        Ok(vector) => println!("\nEmbedding OK ({} dimensions)", vector.len()),
        Err(e) => eprintln!("\nEmbedding failed ({}): {}", e.kind(), e),
    }

    match provider.generate("Say hello in one short sentence.").await {
        Ok(text) => println!("Generation OK: {}", text.trim()),
        Err(e) => {
            eprintln!("Generation failed ({}): {}", e.kind(), e);
            eprintln!("\nTroubleshooting:");
            eprintln!("  1. Is Ollama running? (ollama serve)");
            eprintln!("  2. Are the models pulled? (ollama pull {})", config.llm.model);
            eprintln!("  3. Is the base URL correct? ({})", config.llm.base_url);
        }
    }
}
