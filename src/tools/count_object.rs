use std::sync::LazyLock;

use regex::Regex;

use super::{Stage, Tool};
use crate::bbox::BoundingBox;
use crate::error::VisionError;
use crate::imaging::Image;
use crate::openai::{self, OpenAiSettings};

static DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("digit pattern is valid"));

/// Input for [`CountGivenObject`].
#[derive(Debug, Clone)]
pub struct CountRequest {
    pub image: Image,
    /// The object description in English.
    pub object: String,
    /// Optional region in the `(x1, y1, x2, y2)` format.
    pub bbox: Option<String>,
}

/// Counts a given kind of object in an image or a region of it.
pub struct CountGivenObject {
    stage: Stage,
}

impl CountGivenObject {
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

    fn prompt(object: &str) -> String {
        format!("How many {} are in the image? Reply a digit", object)
    }

    /// First run of digits in `answer`, or 0 when there is none.
    fn parse_count(answer: &str) -> Result<u64, VisionError> {
        match DIGITS.find(answer) {
            Some(m) => m.as_str().parse().map_err(|e| {
                VisionError::MalformedResponse(format!("count `{}` out of range: {}", m.as_str(), e))
            }),
            None => {
                log::info!("CountGivenObject: no digits in answer, counting 0");
                Ok(0)
            }
        }
    }
}

#[async_trait::async_trait]
impl Tool for CountGivenObject {
    type Input = CountRequest;
    type Output = u64;

    fn name(&self) -> &str {
        "count_given_object"
    }

    fn description(&self) -> &str {
        "The tool can count the number of a certain object in the image."
    }

    fn is_ready(&self) -> bool {
        self.stage.is_ready()
    }

    fn setup(&mut self) -> Result<(), VisionError> {
        self.stage.setup()
    }

    async fn apply(&self, request: CountRequest) -> Result<u64, VisionError> {
        let inferencer = self.stage.inferencer(self.name())?;

        let image = match &request.bbox {
            Some(bbox) => {
                let bbox: BoundingBox = bbox.parse()?;
                log::info!("CountGivenObject: counting `{}` in {}", request.object, bbox);
                request.image.crop(&bbox)?
            }
            None => {
                log::info!("CountGivenObject: counting `{}` in whole image", request.object);
                request.image
            }
        }
        .into_rgb();

        let response = inferencer
            .infer(&image, &Self::prompt(&request.object))
            .await?;
        let answer = openai::extract_answer(&response)?;

        Self::parse_count(&answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{bgr_gradient, CannedInferencer};
    use serde_json::json;
    use std::sync::Arc;

    fn tool_answering(answer: &str) -> (CountGivenObject, Arc<CannedInferencer>) {
        let canned = Arc::new(CannedInferencer::new(
            json!({"choices": [{"pred_answer": answer}]}),
        ));
        (
            CountGivenObject::with_inferencer(Box::new(canned.clone())),
            canned,
        )
    }

    fn request(bbox: Option<&str>) -> CountRequest {
        CountRequest {
            image: bgr_gradient(),
            object: "cats".to_string(),
            bbox: bbox.map(str::to_string),
        }
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(CountGivenObject::parse_count("3 cats are visible").unwrap(), 3);
        assert_eq!(CountGivenObject::parse_count("There are 12.").unwrap(), 12);
        assert_eq!(CountGivenObject::parse_count("7 or 8").unwrap(), 7);
        assert_eq!(CountGivenObject::parse_count("no objects found").unwrap(), 0);
        assert_eq!(CountGivenObject::parse_count("").unwrap(), 0);
    }

    #[test]
    fn test_parse_count_overflow() {
        let err = CountGivenObject::parse_count("99999999999999999999999").unwrap_err();
        assert!(matches!(err, VisionError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_counts_first_integer() {
        let (tool, canned) = tool_answering("3 cats are visible");
        assert_eq!(tool.apply(request(None)).await.unwrap(), 3);

        let seen = canned.seen.lock().unwrap();
        let (prompt, width, height, _) = &seen[0];
        assert_eq!(prompt, "How many cats are in the image? Reply a digit");
        assert_eq!((*width, *height), (200, 300));
    }

    #[tokio::test]
    async fn test_no_digits_counts_zero() {
        let (tool, _) = tool_answering("no objects found");
        assert_eq!(tool.apply(request(None)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_crops_to_bbox() {
        let (tool, canned) = tool_answering("2");
        let count = tool
            .apply(request(Some("(10, 20, 110, 220)")))
            .await
            .unwrap();
        assert_eq!(count, 2);

        let seen = canned.seen.lock().unwrap();
        let (_, width, height, corner) = &seen[0];
        assert_eq!((*width, *height), (100, 200));
        // Pixel (10, 20) in RGB order
        assert_eq!(corner, &[10, 20, 128]);
    }

    #[tokio::test]
    async fn test_invalid_bbox_skips_request() {
        let (tool, canned) = tool_answering("2");
        let err = tool.apply(request(Some("(10, 20)"))).await.unwrap_err();
        assert!(matches!(err, VisionError::InvalidBoundingBox(_)));
        assert!(canned.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_response_is_error() {
        let tool = CountGivenObject::with_inferencer(Box::new(CannedInferencer::new(json!({}))));
        let err = tool.apply(request(None)).await.unwrap_err();
        assert!(matches!(err, VisionError::MalformedResponse(_)));
    }
}
