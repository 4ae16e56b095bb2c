//! PDF rasterisation on a dedicated pdfium thread.
//!
//! pdfium is not safe to drive from several threads at once, and binding the
//! shared library is the slow part of engine start-up. The [`RenderWorker`]
//! binds it exactly once on its own OS thread and then serves render jobs
//! sent over a channel, replying through a oneshot per job. Async callers
//! never block a Tokio worker thread on pdfium.

use crate::error::{ConstructionError, ConversionError};
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use tokio::sync::oneshot;
use tracing::{debug, info};

/// One rasterised page.
pub struct PageImage {
    /// 0-based page index.
    pub index: usize,
    pub image: DynamicImage,
}

struct RenderJob {
    pdf_path: PathBuf,
    max_pixels: u32,
    reply: oneshot::Sender<Result<Vec<PageImage>, ConversionError>>,
}

/// Handle to the pdfium render thread.
pub struct RenderWorker {
    jobs: mpsc::Sender<RenderJob>,
}

impl RenderWorker {
    /// Spawn the render thread and bind pdfium from `library`.
    ///
    /// Resolves once the library is bound, so a bad library surfaces here
    /// rather than on the first conversion.
    pub async fn start(library: PathBuf) -> Result<Self, ConstructionError> {
        let (jobs_tx, jobs_rx) = mpsc::channel::<RenderJob>();
        let (ready_tx, ready_rx) = oneshot::channel::<Result<(), ConstructionError>>();

        std::thread::Builder::new()
            .name("pdfium-render".into())
            .spawn(move || {
                let pdfium = match pdfium_auto::bind_pdfium_from_path(&library) {
                    Ok(pdfium) => {
                        info!("PDFium bound from {}", library.display());
                        let _ = ready_tx.send(Ok(()));
                        pdfium
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(ConstructionError::PdfiumUnavailable(
                            e.to_string(),
                        )));
                        return;
                    }
                };

                while let Ok(job) = jobs_rx.recv() {
                    let result = render_document(&pdfium, &job.pdf_path, job.max_pixels);
                    let _ = job.reply.send(result);
                }
                debug!("Render worker stopped");
            })
            .map_err(|e| ConstructionError::Other(format!("Failed to spawn render thread: {e}")))?;

        ready_rx.await.map_err(|_| {
            ConstructionError::Aborted("render thread exited during start-up".into())
        })??;

        Ok(Self { jobs: jobs_tx })
    }

    /// Rasterise every page of `pdf_path`, longest edge capped at `max_pixels`.
    pub async fn render(
        &self,
        pdf_path: &Path,
        max_pixels: u32,
    ) -> Result<Vec<PageImage>, ConversionError> {
        let (reply, response) = oneshot::channel();
        self.jobs
            .send(RenderJob {
                pdf_path: pdf_path.to_path_buf(),
                max_pixels,
                reply,
            })
            .map_err(|_| ConversionError::Engine("render worker is not running".into()))?;

        response
            .await
            .map_err(|_| ConversionError::Engine("render worker dropped the job".into()))?
    }
}

/// Blocking implementation of page rendering. Runs on the worker thread.
fn render_document(
    pdfium: &Pdfium,
    pdf_path: &Path,
    max_pixels: u32,
) -> Result<Vec<PageImage>, ConversionError> {
    let document = pdfium.load_pdf_from_file(pdf_path, None).map_err(|e| {
        let detail = format!("{:?}", e);
        if detail.to_ascii_lowercase().contains("password") {
            ConversionError::PasswordRequired {
                path: pdf_path.to_path_buf(),
            }
        } else {
            ConversionError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail,
            }
        }
    })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    let render_config = PdfRenderConfig::new()
        .set_target_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut images = Vec::with_capacity(total_pages);
    for index in 0..total_pages {
        let page = pages
            .get(index as u16)
            .map_err(|e| ConversionError::RasterisationFailed {
                page: index + 1,
                detail: format!("{:?}", e),
            })?;

        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            ConversionError::RasterisationFailed {
                page: index + 1,
                detail: format!("{:?}", e),
            }
        })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            index + 1,
            image.width(),
            image.height()
        );
        images.push(PageImage { index, image });
    }

    Ok(images)
}
