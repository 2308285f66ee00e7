// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use fit_relabel::error::{AppError, Result};
use fit_relabel::fit::{self, mesg_num, BaseType, FitFile, Message};
use fit_relabel::models::DeviceIdentity;
use fit_relabel::services::{
    BatchOptions, BatchProcessor, Credentials, EditOptions, FileEditor, Session, UploadClient,
    UploadReceipt,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// `time_created` used by test files (2021-09-08T01:46:40Z).
#[allow(dead_code)]
pub const TIME_CREATED: u64 = 1_000_000_000;

/// Build an activity file with the given `file_id` identity, a matching
/// `device_info`, and a few records.
#[allow(dead_code)]
pub fn activity(manufacturer: u16, product: u16) -> FitFile {
    let mut messages = vec![
        Message::new(mesg_num::FILE_ID, 0)
            .with_uint(0, BaseType::ENUM, 4)
            .with_uint(1, BaseType::UINT16, u64::from(manufacturer))
            .with_uint(2, BaseType::UINT16, u64::from(product))
            .with_uint(3, BaseType::UINT32Z, 12345)
            .with_uint(4, BaseType::UINT32, TIME_CREATED),
        Message::new(mesg_num::DEVICE_INFO, 1)
            .with_uint(0, BaseType::UINT8, 0)
            .with_uint(2, BaseType::UINT16, u64::from(manufacturer))
            .with_uint(4, BaseType::UINT16, u64::from(product)),
    ];
    for i in 0..5u64 {
        messages.push(
            Message::new(mesg_num::RECORD, 2)
                .with_uint(253, BaseType::UINT32, TIME_CREATED + i)
                .with_uint(7, BaseType::UINT16, 200 + i),
        );
    }
    FitFile {
        header: Default::default(),
        messages,
    }
}

/// Write an encoded activity into `dir` and return its path.
#[allow(dead_code)]
pub fn write_activity(dir: &Path, name: &str, manufacturer: u16, product: u16) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, fit::encode(&activity(manufacturer, product))).unwrap();
    path
}

/// `(manufacturer, product)` of the first `file_id` in encoded bytes.
#[allow(dead_code)]
pub fn file_id_identity(bytes: &[u8]) -> (u64, u64) {
    let file = fit::decode(bytes).unwrap();
    let file_id = file.messages_of(mesg_num::FILE_ID).next().unwrap();
    (
        file_id.read_uint(1).unwrap().unwrap(),
        file_id.read_uint(2).unwrap().unwrap(),
    )
}

/// Scripted reply for one uploaded file name.
#[derive(Debug, Clone, Copy)]
#[allow(dead_code)]
pub enum MockReply {
    Accepted(u64),
    Conflict,
    ServerError,
    Unauthorized,
}

/// Upload client that records uploads and replies from a script.
/// Files without a scripted reply are accepted.
#[derive(Default)]
pub struct MockUploader {
    replies: Mutex<HashMap<String, MockReply>>,
    uploads: Mutex<Vec<(String, Vec<u8>)>>,
    auth_calls: AtomicUsize,
    reject_login: bool,
}

#[allow(dead_code)]
impl MockUploader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting_login() -> Self {
        Self {
            reject_login: true,
            ..Self::default()
        }
    }

    pub fn reply(self, file_name: &str, reply: MockReply) -> Self {
        self.replies
            .lock()
            .unwrap()
            .insert(file_name.to_string(), reply);
        self
    }

    pub fn uploaded_names(&self) -> Vec<String> {
        self.uploads
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn uploaded_bytes(&self, file_name: &str) -> Option<Vec<u8>> {
        self.uploads
            .lock()
            .unwrap()
            .iter()
            .find(|(name, _)| name == file_name)
            .map(|(_, bytes)| bytes.clone())
    }

    pub fn auth_calls(&self) -> usize {
        self.auth_calls.load(Ordering::SeqCst)
    }
}

impl UploadClient for MockUploader {
    async fn authenticate(&self, _credentials: &Credentials) -> Result<Session> {
        self.auth_calls.fetch_add(1, Ordering::SeqCst);
        if self.reject_login {
            return Err(AppError::Authentication("bad password".to_string()));
        }
        Ok(Session {
            access_token: "test-token".to_string(),
            expires_at: None,
        })
    }

    async fn upload(
        &self,
        _session: &Session,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadReceipt> {
        self.uploads
            .lock()
            .unwrap()
            .push((file_name.to_string(), bytes));
        let reply = self.replies.lock().unwrap().get(file_name).copied();
        match reply {
            None => Ok(UploadReceipt { activity_id: None }),
            Some(MockReply::Accepted(id)) => Ok(UploadReceipt {
                activity_id: Some(id),
            }),
            Some(MockReply::Conflict) => Err(AppError::Conflict),
            Some(MockReply::ServerError) => Err(AppError::Transport("HTTP 500".to_string())),
            Some(MockReply::Unauthorized) => Err(AppError::Authentication(
                "session rejected (HTTP 401)".to_string(),
            )),
        }
    }
}

/// Batch processor over a mock uploader with default options.
#[allow(dead_code)]
pub fn processor(uploader: MockUploader) -> BatchProcessor<MockUploader> {
    processor_with(uploader, BatchOptions::default())
}

#[allow(dead_code)]
pub fn processor_with(uploader: MockUploader, options: BatchOptions) -> BatchProcessor<MockUploader> {
    BatchProcessor::new(
        uploader,
        Credentials::default(),
        FileEditor::new(DeviceIdentity::EDGE_830, EditOptions::default()),
        options,
    )
}
