use super::UpdateEdlArgs;
use anyhow::Result;
use serde::Serialize;

#[derive(Serialize, Debug)]
struct UpdateBody<'a> {
    query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a str>,
}

fn request_body(args: &UpdateEdlArgs) -> UpdateBody<'_> {
    UpdateBody {
        query: &args.query,
        format: args.format.as_deref(),
    }
}

pub async fn run(args: &UpdateEdlArgs, server: &str) -> Result<()> {
    let client = reqwest::Client::new();
    let url = format!("{}/update-edl", server.trim_end_matches('/'));
    let resp = client
        .post(&url)
        .json(&request_body(args))
        .send()
        .await
        .map_err(|e| anyhow::anyhow!("HTTP request failed: {}. Is `edl serve` running?", e))?;

    let body: serde_json::Value = resp.json().await?;
    if body["success"].as_bool() != Some(true) {
        anyhow::bail!("{}", body["error"].as_str().unwrap_or("update failed"));
    }

    println!("{}", body["data"]["readable"].as_str().unwrap_or_default());
    Ok(())
}
