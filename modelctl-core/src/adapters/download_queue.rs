//! `curl`-backed reference implementation of [`DownloadQueue`].
//!
//! Spawns one OS thread per submitted download and drives the five
//! [`DownloadCallbacks`] from that thread, the same one-thread-per-transfer
//! shape as the single-stream downloader this is modeled on. No resume, no
//! segmented/multi-range transfers — those live in a real download manager,
//! not in this reference adapter.

use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::ports::{
    DownloadCallbacks, DownloadHandle, DownloadPartInfo, DownloadQueue, DownloadRequest,
};

#[derive(Default)]
pub struct CurlDownloadQueue {
    next_handle: AtomicU64,
    cancelled: Mutex<HashMap<DownloadHandle, Arc<AtomicBool>>>,
}

impl CurlDownloadQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DownloadQueue for CurlDownloadQueue {
    fn submit(&self, request: DownloadRequest, callbacks: Arc<dyn DownloadCallbacks>) -> DownloadHandle {
        let handle = DownloadHandle(self.next_handle.fetch_add(1, Ordering::SeqCst));
        let cancel_flag = Arc::new(AtomicBool::new(false));
        self.cancelled
            .lock()
            .unwrap()
            .insert(handle, Arc::clone(&cancel_flag));

        std::thread::spawn(move || run_download(handle, request, callbacks, cancel_flag));
        handle
    }

    fn cancel(&self, handle: DownloadHandle) {
        if let Some(flag) = self.cancelled.lock().unwrap().get(&handle) {
            flag.store(true, Ordering::SeqCst);
        }
    }
}

fn destination_path(dest_dir: &std::path::Path, url: &str) -> PathBuf {
    let name = url
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("download");
    dest_dir.join(name)
}

fn run_download(
    handle: DownloadHandle,
    request: DownloadRequest,
    callbacks: Arc<dyn DownloadCallbacks>,
    cancel_flag: Arc<AtomicBool>,
) {
    if let Err(e) = std::fs::create_dir_all(&request.dest_dir) {
        callbacks.on_error(blank_part(handle, &request), e.to_string());
        return;
    }

    let dest_path = destination_path(&request.dest_dir, &request.url);
    callbacks.on_start(DownloadPartInfo {
        handle,
        url: request.url.clone(),
        download_path: Some(dest_path.clone()),
        bytes: 0,
        total_bytes: 0,
        content_type: None,
    });

    match perform(handle, &request, &dest_path, &callbacks, &cancel_flag) {
        Ok(Outcome::Completed { bytes, content_type }) => {
            callbacks.on_complete(DownloadPartInfo {
                handle,
                url: request.url,
                download_path: Some(dest_path),
                bytes,
                total_bytes: bytes,
                content_type,
            });
        }
        Ok(Outcome::Cancelled { bytes }) => {
            let _ = std::fs::remove_file(&dest_path);
            callbacks.on_cancelled(DownloadPartInfo {
                handle,
                url: request.url,
                download_path: Some(dest_path),
                bytes,
                total_bytes: 0,
                content_type: None,
            });
        }
        Err(e) => {
            let _ = std::fs::remove_file(&dest_path);
            callbacks.on_error(
                DownloadPartInfo {
                    handle,
                    url: request.url,
                    download_path: Some(dest_path),
                    bytes: 0,
                    total_bytes: 0,
                    content_type: None,
                },
                e,
            );
        }
    }
}

fn blank_part(handle: DownloadHandle, request: &DownloadRequest) -> DownloadPartInfo {
    DownloadPartInfo {
        handle,
        url: request.url.clone(),
        download_path: None,
        bytes: 0,
        total_bytes: 0,
        content_type: None,
    }
}

enum Outcome {
    Completed { bytes: u64, content_type: Option<String> },
    Cancelled { bytes: u64 },
}

fn perform(
    handle: DownloadHandle,
    request: &DownloadRequest,
    dest_path: &std::path::Path,
    callbacks: &Arc<dyn DownloadCallbacks>,
    cancel_flag: &Arc<AtomicBool>,
) -> Result<Outcome, String> {
    let mut file = File::create(dest_path).map_err(|e| e.to_string())?;
    let written = Arc::new(AtomicU64::new(0));
    let total = Arc::new(AtomicU64::new(0));
    let cancelled = Arc::new(AtomicBool::new(false));
    let content_type = Arc::new(Mutex::new(None::<String>));

    let mut easy = curl::easy::Easy::new();
    easy.url(&request.url).map_err(|e| e.to_string())?;
    easy.follow_location(true).map_err(|e| e.to_string())?;
    easy.connect_timeout(Duration::from_secs(30)).map_err(|e| e.to_string())?;
    easy.low_speed_limit(1024).map_err(|e| e.to_string())?;
    easy.low_speed_time(Duration::from_secs(60)).map_err(|e| e.to_string())?;
    easy.progress(true).map_err(|e| e.to_string())?;

    if let Some(token) = &request.access_token {
        let mut list = curl::easy::List::new();
        list.append(&format!("Authorization: Bearer {token}")).map_err(|e| e.to_string())?;
        easy.http_headers(list).map_err(|e| e.to_string())?;
    }

    {
        let mut transfer = easy.transfer();

        let header_content_type = Arc::clone(&content_type);
        transfer
            .header_function(move |data| {
                if let Ok(line) = std::str::from_utf8(data) {
                    if let Some(value) = line.strip_prefix("Content-Type:").or_else(|| line.strip_prefix("content-type:")) {
                        *header_content_type.lock().unwrap() = Some(value.trim().to_string());
                    }
                }
                true
            })
            .map_err(|e| e.to_string())?;

        let write_written = Arc::clone(&written);
        let write_cancel = Arc::clone(cancel_flag);
        let write_cancelled = Arc::clone(&cancelled);
        transfer
            .write_function(move |data| {
                if write_cancel.load(Ordering::SeqCst) {
                    write_cancelled.store(true, Ordering::SeqCst);
                    return Ok(0);
                }
                match file.write_all(data) {
                    Ok(()) => {
                        write_written.fetch_add(data.len() as u64, Ordering::SeqCst);
                        Ok(data.len())
                    }
                    Err(_) => Ok(0),
                }
            })
            .map_err(|e| e.to_string())?;

        let progress_total = Arc::clone(&total);
        let progress_written = Arc::clone(&written);
        let progress_cancel = Arc::clone(cancel_flag);
        let progress_callbacks = Arc::clone(callbacks);
        let progress_url = request.url.clone();
        let progress_path = dest_path.to_path_buf();
        transfer
            .progress_function(move |dl_total, dl_now, _, _| {
                if dl_total > 0.0 {
                    progress_total.store(dl_total as u64, Ordering::SeqCst);
                }
                progress_written.store(dl_now as u64, Ordering::SeqCst);
                progress_callbacks.on_progress(DownloadPartInfo {
                    handle,
                    url: progress_url.clone(),
                    download_path: Some(progress_path.clone()),
                    bytes: dl_now as u64,
                    total_bytes: dl_total as u64,
                    content_type: None,
                });
                !progress_cancel.load(Ordering::SeqCst)
            })
            .map_err(|e| e.to_string())?;

        if let Err(e) = transfer.perform() {
            if cancelled.load(Ordering::SeqCst) || e.is_write_error() {
                return Ok(Outcome::Cancelled {
                    bytes: written.load(Ordering::SeqCst),
                });
            }
            return Err(format!("download of {} failed: {e}", request.url));
        }
    }

    if cancelled.load(Ordering::SeqCst) {
        return Ok(Outcome::Cancelled {
            bytes: written.load(Ordering::SeqCst),
        });
    }

    let code = easy.response_code().map_err(|e| e.to_string())?;
    if !(200..300).contains(&code) {
        return Err(format!("GET {} returned HTTP {code}", request.url));
    }

    Ok(Outcome::Completed {
        bytes: written.load(Ordering::SeqCst),
        content_type: content_type.lock().unwrap().clone(),
    })
}
