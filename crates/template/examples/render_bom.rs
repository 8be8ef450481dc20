//! Render a bill of materials across several pages
//! Run with: RUST_LOG=debug cargo run --example render_bom
//!
//! Writes a small template and schema under `output/demo`, then builds a
//! document from seven items at three items per page.

use docx_core::DocxDocument;
use std::fs;
use std::path::Path;
use template::{DocumentBuilder, DocumentItem, EngineOptions, RenderRequest, TemplateIdentity};

const SCHEMA: &str = r#"{
    "formCode": "BOM",
    "itemsPerPage": 3,
    "itemFieldTemplates": {
        "Name": "Name_{index}",
        "Designators": "Ref_{index}",
        "Quantity": "Qty_{index}"
    },
    "metaFieldTags": { "DocumentNumber": "DocNumber" }
}"#;

fn control(tag: &str) -> String {
    format!(
        r#"<w:p><w:sdt><w:sdtPr><w:tag w:val="{}"/><w:showingPlcHdr/></w:sdtPr><w:sdtContent><w:r><w:t>{}</w:t></w:r></w:sdtContent></w:sdt></w:p>"#,
        tag, tag
    )
}

fn template_xml() -> String {
    let mut rows = String::new();
    for i in 1..=3 {
        rows.push_str("<w:tr>");
        for prefix in ["Name", "Ref", "Qty"] {
            rows.push_str(&format!("<w:tc>{}</w:tc>", control(&format!("{}_{}", prefix, i))));
        }
        rows.push_str("</w:tr>");
    }
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}<w:tbl><w:tblPr><w:tblStyle w:val="TableGrid"/></w:tblPr>{}</w:tbl><w:sectPr/></w:body></w:document>"#,
        control("DocNumber"),
        rows
    )
}

fn prepare(root: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let word = root.join("Templates").join("Word").join("BOM");
    let schemas = root.join("Templates").join("Schemas");
    fs::create_dir_all(&word)?;
    fs::create_dir_all(&schemas)?;

    DocxDocument::new_with_document(&template_xml())?.save(word.join("v1.docx"))?;
    fs::write(schemas.join("FormBOM.schema.json"), SCHEMA)?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    println!("=== BOM Render ===\n");

    let root = Path::new("output/demo");
    prepare(root)?;
    println!("1. Wrote template and schema under {}", root.display());

    let builder = DocumentBuilder::new(EngineOptions::with_root(root))?;

    let items: Vec<DocumentItem> = (1..=7)
        .map(|i| {
            DocumentItem::new(format!("RES 10k 0402 #{}", i))
                .with_designators(format!("R{}", i))
                .with_quantity(1)
        })
        .collect();
    let request = RenderRequest::new(TemplateIdentity::new("BOM"), items)
        .with_meta("DocumentNumber", Some("BOM-0001"));

    let result = builder.build(&request)?;
    println!(
        "2. Rendered {} pages ({} bytes)",
        result.page_count,
        result.document_bytes.len()
    );
    for issue in &result.issues {
        println!("   {:?} {}: {}", issue.severity, issue.code, issue.message);
    }

    let path = builder.save_output(&result, "bom.docx")?;
    println!("3. Saved -> {}", path.display());

    println!("\n=== Done ===");
    Ok(())
}
