use super::{Stage, Tool};
use crate::error::VisionError;
use crate::imaging::Image;
use crate::openai::{self, OpenAiSettings};

const PROMPT: &str = "Describe the image in detail";

/// Describes a whole image.
pub struct ImageDescription {
    stage: Stage,
}

impl ImageDescription {
    pub fn new(settings: OpenAiSettings) -> Self {
        Self {
            stage: Stage::Uninitialized(settings),
        }
    }

    #[cfg(test)]
    pub fn with_inferencer(inferencer: Box<dyn openai::Inferencer>) -> Self {
        Self {
            stage: Stage::Ready(inferencer),
        }
    }
}

#[async_trait::async_trait]
impl Tool for ImageDescription {
    type Input = Image;
    type Output = String;

    fn name(&self) -> &str {
        "image_description"
    }

    fn description(&self) -> &str {
        "A useful tool that returns a brief description of the input image."
    }

    fn is_ready(&self) -> bool {
        self.stage.is_ready()
    }

    fn setup(&mut self) -> Result<(), VisionError> {
        self.stage.setup()
    }

    async fn apply(&self, image: Image) -> Result<String, VisionError> {
        let inferencer = self.stage.inferencer(self.name())?;
        let image = image.into_rgb();

        log::info!(
            "ImageDescription: describing {}x{} image",
            image.width(),
            image.height()
        );

        let response = inferencer.infer(&image, PROMPT).await?;
        openai::extract_answer(&response)
    }
}
