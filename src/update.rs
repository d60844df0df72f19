//! `-u/--updates`: ask the crates.io registry whether a newer release
//! has been published.

use serde::Deserialize;

#[derive(Deserialize)]
struct RegistryResponse {
    #[serde(rename = "crate")]
    krate: RegistryCrate,
}

#[derive(Deserialize)]
struct RegistryCrate {
    max_version: String,
}

pub struct UpdateStatus {
    pub current: &'static str,
    pub latest: String,
}

impl UpdateStatus {
    pub fn is_current(&self) -> bool {
        self.current == self.latest
    }

    pub fn message(&self) -> String {
        if self.is_current() {
            format!("git-http-server v{} is up to date", self.current)
        } else {
            format!(
                "update available: v{} -> v{}",
                self.current, self.latest
            )
        }
    }
}

pub async fn check() -> anyhow::Result<UpdateStatus> {
    let url = format!(
        "https://crates.io/api/v1/crates/{}",
        env!("CARGO_PKG_NAME")
    );

    let client = reqwest::Client::builder()
        .user_agent(concat!("git-http-server/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let response: RegistryResponse = client
        .get(&url)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    Ok(UpdateStatus {
        current: crate::VERSION,
        latest: response.krate.max_version,
    })
}
