use std::{
    path::{Path, PathBuf},
    sync::mpsc,
    thread,
    time::Duration,
};

use anyhow::{Context, Result, anyhow};

use super::{PageImage, PdfOpener, rasterize_regions};
use crate::{ExtractError, coords::CoordinateSpec, mpscutil};

/// Requests rasterization from a [RasterWorker] thread. Cheap to clone.
#[derive(Clone)]
pub struct RasterClient {
    request_sender: mpsc::SyncSender<Request>,
    timeout: Option<Duration>,
}

impl RasterClient {
    /// Returns a client that gives up waiting for each response after `timeout`.
    pub fn with_timeout(&self, timeout: Option<Duration>) -> Self {
        Self {
            request_sender: self.request_sender.clone(),
            timeout,
        }
    }

    /// Rasterizes the region described by `coords` from the PDF at `pdf_path`.
    ///
    /// Returns `None` without contacting the worker if `coords` is absent or blank.
    pub fn rasterize(
        &self,
        pdf_path: &Path,
        coords: Option<&str>,
        zoom: f32,
    ) -> Result<Option<PageImage>> {
        let Some(region) = CoordinateSpec::parse_optional(coords)? else {
            return Ok(None);
        };
        let mut results = self.rasterize_document(pdf_path, vec![region], zoom)?;
        results
            .pop()
            .ok_or_else(|| anyhow!("rasterization worker returned no result"))?
            .map(Some)
    }

    /// Rasterizes all of `regions` from one opening of the PDF at `pdf_path`. See
    /// [super::rasterize_regions].
    pub fn rasterize_document(
        &self,
        pdf_path: &Path,
        regions: Vec<CoordinateSpec>,
        zoom: f32,
    ) -> Result<Vec<Result<PageImage>>> {
        // Capacity of one so that the worker never blocks on a requester that stopped waiting.
        let (response_sender, response_receiver) = mpsc::sync_channel(1);
        self.request_sender
            .send(Request::RasterizeDocument {
                pdf_path: pdf_path.to_owned(),
                regions,
                zoom,
                response_sender,
            })
            .map_err(|_| anyhow!("rasterization worker has shut down"))?;
        self.receive(&response_receiver)
            .with_context(|| format!("rasterizing regions of {:?}", pdf_path))
    }

    fn receive<T>(&self, response_receiver: &mpsc::Receiver<Result<T>>) -> Result<T> {
        let Some(timeout) = self.timeout else {
            return response_receiver
                .recv()
                .context("receiving response from rasterization worker")?;
        };
        match response_receiver.recv_timeout(timeout) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                log::warn!(
                    "No rasterization response within {:?}; the worker may still be busy and \
                     delay later requests.",
                    timeout
                );
                Err(ExtractError::RasterTimeout.into())
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                Err(anyhow!("rasterization worker disconnected"))
            }
        }
    }
}

/// Dedicated thread that owns a [PdfOpener] and serialises all PDF work through it.
///
/// The thread stops once every [RasterClient] has been dropped.
pub struct RasterWorker {
    // Dropped before joining in `shutdown`, which ends the worker loop if no clones remain.
    client: RasterClient,
    thread_join: thread::JoinHandle<()>,
}

impl RasterWorker {
    /// Starts the worker thread, constructing its opener on that thread with `make_opener`.
    /// Fails if `make_opener` fails.
    pub fn spawn<O, F>(make_opener: F) -> Result<Self>
    where
        O: PdfOpener,
        F: FnOnce() -> Result<O> + Send + 'static,
    {
        let (request_sender, request_receiver) = mpsc::sync_channel(0);
        let (ready_sender, ready_receiver) = mpsc::sync_channel(1);

        let thread_join = thread::Builder::new()
            .name("rasterizer".to_string())
            .spawn(move || {
                let opener = match make_opener() {
                    Ok(opener) => opener,
                    Err(err) => {
                        mpscutil::send_or_log_warning(&ready_sender, "RasterWorker error", Err(err));
                        return;
                    }
                };
                mpscutil::send_or_log_warning(&ready_sender, "RasterWorker ready", Ok(()));
                serve(&opener, request_receiver);
            })
            .context("spawning rasterization thread")?;

        ready_receiver
            .recv()
            .context("receiving rasterization worker start-up result")??;

        Ok(Self {
            client: RasterClient {
                request_sender,
                timeout: None,
            },
            thread_join,
        })
    }

    pub fn client(&self) -> RasterClient {
        self.client.clone()
    }

    /// Stops accepting requests from this handle and waits for the thread to finish. Blocks
    /// until all other clients have also been dropped.
    pub fn shutdown(self) -> Result<()> {
        drop(self.client);
        self.thread_join
            .join()
            .map_err(|_| anyhow!("rasterization thread panicked"))
    }
}

fn serve(opener: &dyn PdfOpener, request_receiver: mpsc::Receiver<Request>) {
    loop {
        let request = match request_receiver.recv() {
            Ok(request) => request,
            Err(_) => {
                log::info!("Request channel closed; terminating rasterization worker loop.");
                return;
            }
        };

        match request {
            Request::RasterizeDocument {
                pdf_path,
                regions,
                zoom,
                response_sender,
            } => {
                log::debug!("Rasterizing {} region(s) of {:?}.", regions.len(), pdf_path);
                mpscutil::send_or_log_warning(
                    &response_sender,
                    "RasterizeDocument response",
                    rasterize_regions(opener, &pdf_path, &regions, zoom),
                );
            }
        }
    }
}

enum Request {
    RasterizeDocument {
        pdf_path: PathBuf,
        regions: Vec<CoordinateSpec>,
        zoom: f32,
        response_sender: mpsc::SyncSender<Result<Vec<Result<PageImage>>>>,
    },
}
