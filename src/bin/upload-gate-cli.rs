use base64::Engine;
use clap::{Parser, Subcommand};
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use std::path::{Path, PathBuf};

use upload_gate::upload::content_type_for;

#[derive(Parser)]
#[command(name = "upload-gate-cli")]
#[command(about = "Client for the upload gate", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload files for conversion and save the results
    Compress {
        /// Files to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Quality between 10 and 100
        #[arg(short, long, default_value_t = 80)]
        level: u8,

        /// Target format: all, jpeg, png or webp
        #[arg(short, long, default_value = "all")]
        format: String,

        /// Directory to write converted files into
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// Check server health
    Health,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Compress {
            files,
            level,
            format,
            out_dir,
        } => {
            let mut form = Form::new()
                .text("compressionLevel", level.to_string())
                .text("fileType", format);

            for path in &files {
                let name = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("file")
                    .to_string();
                let bytes = tokio::fs::read(path).await?;
                let part = Part::bytes(bytes)
                    .file_name(name.clone())
                    .mime_str(content_type_for(&name))?;
                form = form.part("files", part);
            }

            let res = client
                .post(format!("{}/api/compress", cli.url))
                .multipart(form)
                .send()
                .await?;

            let json = read_response(res).await?;
            save_files(&json, &out_dir).await?;
        }
        Commands::Health => {
            let res = client.get(format!("{}/health", cli.url)).send().await?;
            let json = read_response(res).await?;
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
    }

    Ok(())
}

async fn read_response(res: reqwest::Response) -> Result<Value, Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        if let Some(retry) = res.headers().get(reqwest::header::RETRY_AFTER) {
            eprintln!("Retry after: {}s", retry.to_str().unwrap_or("?"));
        }
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Err(format!("server returned status {}", status).into());
    }

    Ok(res.json().await?)
}

async fn save_files(json: &Value, out_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    tokio::fs::create_dir_all(out_dir).await?;

    let files = json["files"].as_array().cloned().unwrap_or_default();
    for file in &files {
        let (Some(name), Some(data)) = (file["compressedName"].as_str(), file["base64Data"].as_str())
        else {
            continue;
        };
        let bytes = base64::engine::general_purpose::STANDARD.decode(data)?;
        let path = out_dir.join(name);
        tokio::fs::write(&path, &bytes).await?;
        println!(
            "{} -> {} ({} -> {} bytes, {:.1}% saved)",
            file["originalName"].as_str().unwrap_or("?"),
            path.display(),
            file["originalSize"],
            file["compressedSize"],
            file["compressionRatio"].as_f64().unwrap_or(0.0)
        );
    }

    if let Some(message) = json["message"].as_str() {
        println!("{}", message);
    }
    println!(
        "Remaining requests: {}",
        json["rateLimit"]["remaining"]
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, body: &str) -> reqwest::Response {
        axum::http::Response::builder()
            .status(status)
            .header("content-type", "application/json")
            .body(body.to_string())
            .unwrap()
            .into()
    }

    #[tokio::test]
    async fn test_rejection_is_an_error() {
        let res = response(429, r#"{"error":"Too many requests","code":"admission_denied"}"#);
        let err = read_response(res).await.unwrap_err();
        assert!(err.to_string().contains("429"));
    }

    #[tokio::test]
    async fn test_success_body_is_returned() {
        let json = read_response(response(200, r#"{"status":"ok"}"#)).await.unwrap();
        assert_eq!(json["status"], "ok");
    }
}
