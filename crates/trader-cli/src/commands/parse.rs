//! 시그널 해석 커맨드.

use std::path::PathBuf;

use anyhow::Context;
use tokio::io::AsyncReadExt;
use trader_core::interpret;

pub async fn parse_signal(path: Option<PathBuf>) -> anyhow::Result<()> {
    let text = match path {
        Some(path) => tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("시그널 파일 읽기 실패: {}", path.display()))?,
        None => {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("표준 입력 읽기 실패")?;
            buf
        }
    };

    match interpret(&text) {
        Ok(intent) => {
            println!("{}", serde_json::to_string_pretty(&intent)?);
            Ok(())
        }
        Err(e) => {
            println!("❌ 시그널 해석 실패: {}", e);
            Err(e.into())
        }
    }
}
