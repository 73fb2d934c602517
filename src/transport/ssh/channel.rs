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

use russh::client::Handle;

use super::client::ClientHandler;
use crate::transport::{CommandOutput, Error};

/// Initial capacity of the stdout buffer.
const SSH_CMD_BUFFER_SIZE: usize = 8192;

/// Initial capacity of the stderr buffer.
const SSH_RESPONSE_BUFFER_SIZE: usize = 1024;

/// Execute a remote command on a fresh session channel.
///
/// Every invocation is a new shell context, so `cd` or variable assignments
/// do not carry over to later commands.
pub(super) async fn execute(
    handle: &Handle<ClientHandler>,
    command: &str,
) -> Result<CommandOutput, Error> {
    let mut stdout = Vec::with_capacity(SSH_CMD_BUFFER_SIZE);
    let mut stderr = Vec::with_capacity(SSH_RESPONSE_BUFFER_SIZE);
    let mut channel = handle.channel_open_session().await?;
    channel.exec(true, command).await?;

    let mut exit_status: Option<u32> = None;
    while let Some(msg) = channel.wait().await {
        match msg {
            russh::ChannelMsg::Data { ref data } => stdout.extend_from_slice(data),
            russh::ChannelMsg::ExtendedData { ref data, ext } => {
                if ext == 1 {
                    stderr.extend_from_slice(data);
                }
            }
            // The exit status may arrive before the last data packet, so keep
            // reading until the channel closes.
            russh::ChannelMsg::ExitStatus { exit_status: status } => exit_status = Some(status),
            _ => {}
        }
    }

    match exit_status {
        Some(exit_status) => Ok(CommandOutput {
            stdout,
            stderr,
            exit_status,
        }),
        None => Err(Error::CommandDidntExit),
    }
}
