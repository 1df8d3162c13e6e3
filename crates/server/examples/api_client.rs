//! Examples for calling the filekit gateway

use reqwest::multipart::{Form, Part};
use reqwest::Client;

const SERVER_URL: &str = "http://localhost:8080";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let client = Client::new();

    // Example 1: Health check
    println!("1. Health Check:");
    let resp = client.get(format!("{SERVER_URL}/health")).send().await?;
    println!("Status: {}", resp.status());
    println!("Body: {}", resp.text().await?);
    println!();

    // Example 2: Merge two documents
    println!("2. Merge:");
    let form = Form::new()
        .part(
            "files",
            Part::bytes(b"%PDF-1.7 first".to_vec())
                .file_name("first.pdf")
                .mime_str("application/pdf")?,
        )
        .part(
            "files",
            Part::bytes(b"%PDF-1.7 second".to_vec())
                .file_name("second.pdf")
                .mime_str("application/pdf")?,
        );
    let resp = client
        .post(format!("{SERVER_URL}/merge"))
        .multipart(form)
        .send()
        .await?;
    println!("Status: {}", resp.status());
    println!("Body: {}", resp.text().await?);
    println!();

    // Example 3: Split with a page selection
    println!("3. Split:");
    let form = Form::new()
        .part(
            "file",
            Part::bytes(b"%PDF-1.7 doc".to_vec()).file_name("doc.pdf"),
        )
        .text("pages", "1-3, 5");
    let resp = client
        .post(format!("{SERVER_URL}/split"))
        .multipart(form)
        .send()
        .await?;
    println!("Status: {}", resp.status());
    println!("Body: {}", resp.text().await?);
    println!();

    // Example 4: Text to PDF, no file parts
    println!("4. Text to PDF:");
    let form = Form::new()
        .text("text", "Hello from the API client.")
        .text("title", "Greeting");
    let resp = client
        .post(format!("{SERVER_URL}/text-to-pdf"))
        .multipart(form)
        .send()
        .await?;
    println!("Status: {}", resp.status());
    println!("Body: {}", resp.text().await?);
    println!();

    // Example 5: Wrong content type
    println!("5. JSON body (rejected):");
    let resp = client
        .post(format!("{SERVER_URL}/merge"))
        .json(&serde_json::json!({ "files": [] }))
        .send()
        .await?;
    println!("Status: {}", resp.status());
    println!("Body: {}", resp.text().await?);

    Ok(())
}
