// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Basic file read and write operations.
//!
//! Demonstrates opening files with a mode string, both as an awaited facade
//! that is closed explicitly and as a scope that closes itself.

use std::io::SeekFrom;

use futures::TryStreamExt;

#[tokio::main]
async fn main() -> offload_fs::Result<()> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();

    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("greeting.txt");

    // Await the context, then close the file yourself.
    let file = offload_fs::open(&path, "w").await?;
    let text = file.as_text()?;
    let _ = text.write("Hello, world!\n").await?;
    text.writelines(["second line\n", "third line\n"]).await?;
    file.close().await?;

    // Or let a scope close it, even if the body fails.
    let lines: Vec<String> = offload_fs::open(&path, "r")
        .scope(async |file| -> offload_fs::Result<Vec<String>> { file.as_text()?.lines().try_collect().await })
        .await?;
    println!("read {} lines: {lines:?}", lines.len());

    // Binary modes give byte-oriented facades.
    let head = offload_fs::open(&path, "r+b")
        .scope(async |file| -> offload_fs::Result<Vec<u8>> {
            let stream = file.as_buffered_reader()?;
            let _ = stream.seek(SeekFrom::Start(0)).await?;
            let _ = stream.write(b"Jello").await?;
            let _ = stream.seek(SeekFrom::Start(0)).await?;
            stream.read(Some(13)).await
        })
        .await?;
    println!("updated: {}", String::from_utf8_lossy(&head));

    println!("size on disk: {} bytes", offload_fs::path::size(&path).await?);
    Ok(())
}
