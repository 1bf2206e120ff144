use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result, anyhow};
use log::{debug, info};
use opencv::core::{Mat, Ptr, Size, Vector};
use opencv::imgcodecs;
use opencv::objdetect::{FaceDetectorYN, FaceRecognizerSF};
use opencv::prelude::*;

use super::Encoder;
use crate::config::{DataDir, EncoderOptions};

const DEFAULT_DETECTOR_MODEL: &str = "face_detection_yunet_2023mar.onnx";
const DEFAULT_RECOGNIZER_MODEL: &str = "face_recognition_sface_2021dec.onnx";

#[derive(Debug, Clone)]
struct ModelOptions {
    detector: String,
    recognizer: String,
    score_threshold: f32,
    nms_threshold: f32,
    top_k: i32,
}

// 注意：MODEL_OPTIONS 必须在 MODELS 之前初始化
static MODEL_OPTIONS: OnceLock<ModelOptions> = OnceLock::new();

thread_local! {
    static MODELS: RefCell<Option<FaceModels>> = const { RefCell::new(None) };
}

/// 每个线程独立持有的一组模型，OpenCV 的 DNN 对象不能跨线程共享
struct FaceModels {
    detector: Ptr<FaceDetectorYN>,
    recognizer: Ptr<FaceRecognizerSF>,
}

impl FaceModels {
    fn load(opts: &ModelOptions) -> Result<Self> {
        debug!("加载人脸模型: {} / {}", opts.detector, opts.recognizer);
        let detector = FaceDetectorYN::create(
            &opts.detector,
            "",
            Size::new(320, 320),
            opts.score_threshold,
            opts.nms_threshold,
            opts.top_k,
            0,
            0,
        )?;
        let recognizer = FaceRecognizerSF::create(&opts.recognizer, "", 0, 0)?;
        Ok(Self { detector, recognizer })
    }

    fn encode(&mut self, image: &[u8]) -> Result<Vec<Vec<f64>>> {
        let buf = Vector::<u8>::from_slice(image);
        let img = imgcodecs::imdecode(&buf, imgcodecs::IMREAD_COLOR)?;
        if img.empty() {
            return Err(anyhow!("cannot identify image file"));
        }

        let mut faces = Mat::default();
        self.detector.set_input_size(Size::new(img.cols(), img.rows()))?;
        self.detector.detect(&img, &mut faces)?;

        let mut embeddings = Vec::with_capacity(faces.rows().max(0) as usize);
        for i in 0..faces.rows() {
            let face = faces.row(i)?.try_clone()?;
            let mut aligned = Mat::default();
            let mut feature = Mat::default();
            self.recognizer.align_crop(&img, &face, &mut aligned)?;
            self.recognizer.feature(&aligned, &mut feature)?;
            let values = feature.data_typed::<f32>()?;
            embeddings.push(values.iter().map(|&v| v as f64).collect());
        }
        Ok(embeddings)
    }
}

/// 基于 OpenCV YuNet + SFace 的人脸编码器
pub struct OpencvEncoder;

impl OpencvEncoder {
    pub fn new(data_dir: &DataDir, opts: &EncoderOptions) -> Result<Self> {
        let models = data_dir.models();
        let detector = resolve_model(opts.detector_model.as_deref(), &models, DEFAULT_DETECTOR_MODEL)?;
        let recognizer =
            resolve_model(opts.recognizer_model.as_deref(), &models, DEFAULT_RECOGNIZER_MODEL)?;
        let options = ModelOptions {
            detector,
            recognizer,
            score_threshold: opts.score_threshold,
            nms_threshold: opts.nms_threshold,
            top_k: opts.top_k,
        };

        // 提前加载一次，尽早暴露模型文件的问题
        FaceModels::load(&options).context("加载人脸模型失败")?;
        let options = MODEL_OPTIONS.get_or_init(|| options);
        info!("人脸模型: {} / {}", options.detector, options.recognizer);

        Ok(Self)
    }
}

impl Encoder for OpencvEncoder {
    fn encode(&self, image: &[u8]) -> Result<Vec<Vec<f64>>> {
        MODELS.with(|slot| {
            let mut slot = slot.borrow_mut();
            let mut models = match slot.take() {
                Some(models) => models,
                None => {
                    let opts = MODEL_OPTIONS.get().ok_or_else(|| anyhow!("人脸模型未初始化"))?;
                    FaceModels::load(opts)?
                }
            };
            let result = models.encode(image);
            *slot = Some(models);
            result
        })
    }
}

fn resolve_model(path: Option<&Path>, models_dir: &Path, default: &str) -> Result<String> {
    let path: PathBuf = match path {
        Some(path) => path.to_path_buf(),
        None => models_dir.join(default),
    };
    if !path.exists() {
        return Err(anyhow!("模型文件不存在: {}", path.display()));
    }
    path.to_str().map(str::to_string).ok_or_else(|| anyhow!("模型路径不是合法的 UTF-8"))
}
