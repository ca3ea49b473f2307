//! One scene in, one page out: blueprint, slots, panels, composition, progress.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use image::RgbImage;
use tracing::{error, info, instrument};

use crate::architect::Architect;
use crate::artist::{Artist, ImageProvider, InferenceModel};
use crate::blueprint::Blueprint;
use crate::config::ServiceConfig;
use crate::editor::{load_story_text, paginate_story};
use crate::error::MangaError;
use crate::layout::Slot;
use crate::progress::ProgressStore;
use crate::typesetter::{ComposedPage, Typesetter};

/// Everything that went into a finished page.
#[derive(Debug)]
pub struct PageReport {
    /// Page number the artifact is named after
    pub page_number: u32,
    /// What the architect planned
    pub blueprint: Blueprint,
    /// Slots of the chosen layout
    pub slots: Vec<Slot>,
    /// Panel bitmaps by id, placeholders included
    pub panel_images: BTreeMap<u32, RgbImage>,
    /// The saved page
    pub composed: ComposedPage,
}

/// Wires the stages together.
#[derive(Debug)]
pub struct Pipeline<P = InferenceModel> {
    architect: Architect,
    artist: Artist<P>,
    typesetter: Typesetter,
    store: ProgressStore,
}

impl Pipeline<InferenceModel> {
    /// Pipeline using the configured services, paths and credentials.
    pub fn from_config(client: reqwest::Client, config: &ServiceConfig) -> Self {
        let artist = Artist::from_settings(&client, &config.images, None, None);
        Self::new(
            Architect::new(client, config.chat.clone()),
            artist,
            Typesetter::new(config.output_dir.clone()),
            ProgressStore::new(config.context_file.clone()),
        )
    }
}

impl<P: ImageProvider + 'static> Pipeline<P> {
    /// Pipeline from its parts.
    pub fn new(
        architect: Architect,
        artist: Artist<P>,
        typesetter: Typesetter,
        store: ProgressStore,
    ) -> Self {
        Self {
            architect,
            artist,
            typesetter,
            store,
        }
    }

    /// The progress store pages are recorded in.
    pub fn store(&self) -> &ProgressStore {
        &self.store
    }

    /// Turns `scene_text` into page `page_number` and records it.
    ///
    /// Remote failures show up as fallback blueprints and placeholder
    /// panels; only local I/O errors come back as `Err`.
    #[instrument(level = "info", skip(self, scene_text))]
    pub async fn produce_page(
        &self,
        page_number: u32,
        scene_text: &str,
    ) -> Result<PageReport, MangaError> {
        info!("Processing page {page_number}");

        let blueprint = self.architect.get_blueprint(scene_text).await;
        info!("Layout: {}", blueprint.layout);

        let slots = blueprint.layout.slots();
        let panel_images = self.artist.generate_page_panels(&blueprint.panels).await;
        let composed = self
            .typesetter
            .assemble_page(&slots, &panel_images, page_number)?;

        self.store.update(page_number, scene_text)?;

        Ok(PageReport {
            page_number,
            blueprint,
            slots,
            panel_images,
            composed,
        })
    }

    /// Illustrates a whole story file, one page per scene, continuing from
    /// the page the progress store is at. Returns the written page paths.
    #[instrument(level = "info", skip(self))]
    pub async fn run_chapter(
        &self,
        input: &Path,
        chunk_size: usize,
    ) -> Result<Vec<PathBuf>, MangaError> {
        let text = load_story_text(input).inspect_err(|err| {
            if let MangaError::InputNotFound(path) = err {
                error!("Input file not found at {}", path.display());
            }
        })?;

        let scenes = paginate_story(&text, chunk_size);
        let mut page_number = self.store.current_page()?;
        let mut pages = Vec::with_capacity(scenes.len());

        for scene in &scenes {
            let report = self.produce_page(page_number, scene).await?;
            pages.push(report.composed.path);
            page_number = page_number.saturating_add(1);
        }

        info!("Finished {} pages", pages.len());
        Ok(pages)
    }
}
