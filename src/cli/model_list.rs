//! Model listing functionality

use crate::api::ModelKind;
use crate::core::models::ModelCatalog;

pub fn format_models(catalog: &ModelCatalog) -> String {
    let mut out = String::new();
    for (kind, heading) in [(ModelKind::Llm, "Chat models"), (ModelKind::Embed, "Embedding models")] {
        out.push_str(&format!("{heading}:\n"));
        let models = catalog.models(kind);
        if models.is_empty() {
            out.push_str("  (none installed)\n");
        }
        for model in models {
            let marker = if catalog.selected(kind) == Some(model.as_str()) {
                "▶"
            } else {
                " "
            };
            out.push_str(&format!("  {marker} {model}\n"));
        }
    }
    out
}

pub fn print_models(catalog: &ModelCatalog) {
    println!("🤖 Available Models");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    print!("{}", format_models(catalog));
    println!();
    println!("💡 A name that is not installed yet is pulled when you select it.");
}
