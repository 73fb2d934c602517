// Copyright 2025 Lablup Inc. and Jeongkyu Shin
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! In-memory file transfer over SFTP.
//!
//! The remote sshd must enable the sftp subsystem
//! (`Subsystem sftp internal-sftp` or `/usr/lib/openssh/sftp-server`).

use russh::client::Handle;
use russh_sftp::client::error::Error as SftpError;
use russh_sftp::client::SftpSession;
use russh_sftp::protocol::{OpenFlags, StatusCode};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use super::client::ClientHandler;
use crate::transport::{Error, FileRead};

async fn open_sftp(handle: &Handle<ClientHandler>) -> Result<SftpSession, Error> {
    let channel = handle.channel_open_session().await?;
    channel.request_subsystem(true, "sftp").await?;
    Ok(SftpSession::new(channel.into_stream()).await?)
}

pub(super) async fn upload(
    handle: &Handle<ClientHandler>,
    contents: &[u8],
    remote_path: &str,
) -> Result<(), Error> {
    let sftp = open_sftp(handle).await?;
    let mut file = sftp
        .open_with_flags(
            remote_path,
            OpenFlags::CREATE | OpenFlags::TRUNCATE | OpenFlags::WRITE,
        )
        .await?;
    file.write_all(contents).await?;
    file.flush().await?;
    file.shutdown().await?;
    Ok(())
}

pub(super) async fn download(handle: &Handle<ClientHandler>, remote_path: &str) -> FileRead {
    let sftp = match open_sftp(handle).await {
        Ok(sftp) => sftp,
        Err(e) => return FileRead::Fault(e),
    };

    let mut file = match sftp.open_with_flags(remote_path, OpenFlags::READ).await {
        Ok(file) => file,
        Err(SftpError::Status(status)) if matches!(status.status_code, StatusCode::NoSuchFile) => {
            return FileRead::Missing;
        }
        Err(e) => return FileRead::Fault(e.into()),
    };

    let mut contents = Vec::new();
    match file.read_to_end(&mut contents).await {
        Ok(_) => FileRead::Found(contents),
        Err(e) => FileRead::Fault(e.into()),
    }
}
