// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Temporary resources and zip archives.
//!
//! Builds a few files inside a temporary directory, packs them into an
//! archive and reads one member back through a nested scope.

use offload_fs::archive::{ArchiveMode, CompressionMethod, open_archive};
use offload_fs::temp::{TempOptions, spooled_temporary_file, temporary_directory};

#[tokio::main]
async fn main() -> offload_fs::Result<()> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();

    let options = TempOptions::new();
    let summary = temporary_directory(&options)
        .scope(async |dir| -> offload_fs::Result<Vec<u8>> {
            let archive_path = dir.path().join("bundle.zip");
            let notes = dir.path().join("notes.txt");
            offload_fs::open(&notes, "w")
                .scope(async |file| -> offload_fs::Result<()> {
                    let _ = file.as_text()?.write("kept in the archive\n").await?;
                    Ok(())
                })
                .await?;

            open_archive(&archive_path, ArchiveMode::Write, CompressionMethod::Deflated)
                .scope(async |archive| -> offload_fs::Result<()> {
                    archive.write(&notes, None).await?;
                    archive.writestr("summary.txt", "two members").await
                })
                .await?;

            open_archive(&archive_path, ArchiveMode::Read, CompressionMethod::Stored)
                .scope(async |archive| -> offload_fs::Result<Vec<u8>> {
                    for info in archive.infolist().await? {
                        println!("{}: {} -> {} bytes", info.name, info.size, info.compressed_size);
                    }
                    archive
                        .open_member("summary.txt")
                        .scope(async |member| member.as_buffered_reader()?.read(None).await)
                        .await
                })
                .await
        })
        .await?;
    println!("summary: {}", String::from_utf8_lossy(&summary));

    // A spooled file stays in memory until it grows past its limit.
    let spooled = spooled_temporary_file(&options, 16).await?;
    let bytes = spooled.as_buffered_reader()?;
    let _ = bytes.write(b"small").await?;
    println!("rolled over after 5 bytes: {}", spooled.is_rolled_over());
    let _ = bytes.write(b"a little more than sixteen").await?;
    println!("rolled over after 31 bytes: {}", spooled.is_rolled_over());
    spooled.close().await?;
    Ok(())
}
