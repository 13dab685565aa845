//! Smoke-tests a running emotion decoder instance.
//!
//! ```sh
//! cargo run --bin api_tester -- --url http://localhost:8080 --image face.jpg
//! ```
use base64::Engine;
use clap::Parser;
use emotion_decoder::utils::logger;
use reqwest::Client;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "api_tester")]
#[command(about = "Exercise every endpoint of the emotion decoder API")]
struct TesterConfig {
    #[arg(long, default_value = "http://localhost:8080")]
    url: String,

    #[arg(long, default_value = "I am feeling incredibly happy and excited today!")]
    text: String,

    /// Image file for the image and multimodal checks; skipped when absent
    #[arg(long)]
    image: Option<PathBuf>,

    #[arg(long, help = "Enable verbose output")]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Passed,
    Failed,
    Skipped,
}

const RESULT_FIELDS: [&str; 4] = ["primary_emotion", "confidence", "intensity", "explanation"];

struct ApiTester {
    client: Client,
    base_url: String,
    results: Vec<(&'static str, Outcome)>,
}

impl ApiTester {
    fn new(base_url: &str) -> anyhow::Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(Duration::from_secs(60)).build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            results: Vec::new(),
        })
    }

    fn banner(title: &str) {
        println!("\n{}\n{}\n{}", "=".repeat(60), title, "=".repeat(60));
    }

    async fn check_health(&mut self) {
        Self::banner("Health Check");
        let url = format!("{}/api/health", self.base_url);
        println!("GET {}", url);

        let outcome = match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => match response.json::<Value>().await
            {
                Ok(body) if body["status"] == "healthy" => {
                    println!("✅ Health check passed\n{}", pretty(&body));
                    Outcome::Passed
                }
                Ok(body) => {
                    println!("❌ Unexpected health payload\n{}", pretty(&body));
                    Outcome::Failed
                }
                Err(e) => {
                    println!("❌ Health response was not JSON: {}", e);
                    Outcome::Failed
                }
            },
            Ok(response) => {
                println!("❌ Health check failed with status {}", response.status());
                Outcome::Failed
            }
            Err(e) => {
                println!("❌ Error: {}", e);
                Outcome::Failed
            }
        };

        self.results.push(("Health Check", outcome));
    }

    async fn check_analysis(&mut self, name: &'static str, path: &str, payload: Value) {
        Self::banner(name);
        let url = format!("{}{}", self.base_url, path);
        println!("POST {}", url);
        tracing::debug!(payload = %summarize(&payload), "Request payload");

        let outcome = match self.client.post(&url).json(&payload).send().await {
            Ok(response) => {
                let status = response.status();
                let body = response.json::<Value>().await.unwrap_or(Value::Null);
                let missing: Vec<&str> = RESULT_FIELDS
                    .iter()
                    .copied()
                    .filter(|field| body.get(*field).is_none())
                    .collect();

                if status.is_success() && missing.is_empty() {
                    println!("✅ {} successful\n{}", name, pretty(&body));
                    Outcome::Passed
                } else if status.is_success() {
                    println!("❌ {} response is missing fields: {}", name, missing.join(", "));
                    Outcome::Failed
                } else {
                    println!("❌ {} failed with status {}\n{}", name, status, pretty(&body));
                    Outcome::Failed
                }
            }
            Err(e) => {
                println!("❌ Error: {}", e);
                Outcome::Failed
            }
        };

        self.results.push((name, outcome));
    }

    async fn check_rejects_empty_body(&mut self) {
        Self::banner("Validation");
        let url = format!("{}/api/analyze/multimodal", self.base_url);
        println!("POST {} (empty body)", url);

        let outcome = match self.client.post(&url).json(&json!({})).send().await {
            Ok(response) if response.status().as_u16() == 400 => {
                println!("✅ Empty body rejected with 400");
                Outcome::Passed
            }
            Ok(response) => {
                println!("❌ Expected 400, got {}", response.status());
                Outcome::Failed
            }
            Err(e) => {
                println!("❌ Error: {}", e);
                Outcome::Failed
            }
        };

        self.results.push(("Validation", outcome));
    }

    fn skip(&mut self, name: &'static str) {
        Self::banner(name);
        println!("⏭️  No valid image provided, skipping");
        self.results.push((name, Outcome::Skipped));
    }

    fn print_summary(&self) -> i32 {
        Self::banner("TEST SUMMARY");

        let count = |wanted: Outcome| self.results.iter().filter(|(_, o)| *o == wanted).count();
        let (passed, failed, skipped) = (
            count(Outcome::Passed),
            count(Outcome::Failed),
            count(Outcome::Skipped),
        );

        println!("\nTotal Tests: {}", self.results.len());
        println!("Passed: {}", passed);
        println!("Failed: {}", failed);
        println!("Skipped: {}", skipped);

        println!("\nDetailed Results:");
        for (name, outcome) in &self.results {
            match outcome {
                Outcome::Passed => println!("  ✅ {}", name),
                Outcome::Failed => println!("  ❌ {}", name),
                Outcome::Skipped => println!("  ⏭️  {} (skipped)", name),
            }
        }

        if failed == 0 {
            println!("\n🎉 ALL TESTS PASSED!");
            0
        } else {
            println!("\n❌ {} TEST(S) FAILED", failed);
            1
        }
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Shortens base64 payloads so they do not flood the log.
fn summarize(payload: &Value) -> String {
    let mut shown = payload.clone();
    if let Some(image) = shown.get_mut("image") {
        let len = image.as_str().map(str::len).unwrap_or(0);
        *image = json!(format!("<{} base64 chars>", len));
    }
    shown.to_string()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = TesterConfig::parse();
    logger::init_cli_logger(config.verbose);

    println!("🚀 Emotion Decoder API Test Suite");
    println!("Target URL: {}", config.url);
    println!("Timestamp: {}", chrono::Utc::now().to_rfc3339());

    let image = match &config.image {
        Some(path) if path.exists() => {
            let bytes = tokio::fs::read(path).await?;
            println!("Using image: {}", path.display());
            Some(base64::engine::general_purpose::STANDARD.encode(bytes))
        }
        Some(path) => {
            println!("⚠️  Image {} not found", path.display());
            None
        }
        None => None,
    };

    let mut tester = ApiTester::new(&config.url)?;

    tester.check_health().await;
    tester
        .check_analysis(
            "Text Analysis",
            "/api/analyze/text",
            json!({ "text": config.text }),
        )
        .await;

    match &image {
        Some(encoded) => {
            tester
                .check_analysis(
                    "Image Analysis",
                    "/api/analyze/image",
                    json!({ "image": encoded }),
                )
                .await;
            tester
                .check_analysis(
                    "Multimodal Analysis",
                    "/api/analyze/multimodal",
                    json!({ "text": config.text, "image": encoded }),
                )
                .await;
        }
        None => {
            tester.skip("Image Analysis");
            tester.skip("Multimodal Analysis");
        }
    }

    tester.check_rejects_empty_body().await;

    std::process::exit(tester.print_summary());
}
