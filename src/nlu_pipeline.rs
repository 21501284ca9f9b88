use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use candle_core::Device;
use failure::ResultExt;
use log::info;

use crate::dictionary::{read_ngram_to_id, write_ngram_to_id};
use crate::embeddings::{EmbeddingEncoder, EmbeddingSource};
use crate::errors::*;
use crate::intent_classifier::{ConvIntentClassifier, IntentClassifier};
use crate::models::{
    DatasetParams, ModelSource, ModelVersion, PipelineDefinition, PipelinePrediction,
    PipelineTestStats, PredictionStats, TestingExamples, TrainingExamples,
};
use crate::slot_filler::{BiLstmSlotFiller, SlotFiller};
use crate::training::{PipelineTrainingReport, TrainStatsHandler};
use crate::utils::{write_atomically, write_json};

const METADATA_FILE: &str = "metadata.json";
const DATASET_PARAMS_FILE: &str = "dataset_params.json";
const PIPELINE_DEFINITION_FILE: &str = "pipeline_definition.json";
const NGRAM_TO_ID_FILE: &str = "ngram_to_id_dictionary.json";
const CLASSIFICATION_WEIGHTS_FILE: &str = "classification.safetensors";
const NER_WEIGHTS_FILE: &str = "ner.safetensors";
const EMBEDDING_WEIGHTS_FILE: &str = "embedding.safetensors";

/// Weights the intent classifier and the slot tagger start from
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PretrainedModels {
    pub classification: ModelSource,
    pub ner: ModelSource,
}

/// Destinations of the trained weights
#[derive(Debug, Clone, PartialEq)]
pub struct SavePaths {
    pub classification: PathBuf,
    pub ner: PathBuf,
    pub embedding: PathBuf,
}

impl SavePaths {
    pub fn in_dir<P: AsRef<Path>>(directory: P) -> Self {
        let directory = directory.as_ref();
        Self {
            classification: directory.join(CLASSIFICATION_WEIGHTS_FILE),
            ner: directory.join(NER_WEIGHTS_FILE),
            embedding: directory.join(EMBEDDING_WEIGHTS_FILE),
        }
    }
}

/// Intent classification followed by intent conditioned slot tagging, both running on the
/// same frozen sub-word embeddings
pub struct NluPipeline {
    definition: PipelineDefinition,
    dataset_params: Arc<DatasetParams>,
    encoder: Arc<EmbeddingEncoder>,
    intent_classifier: Box<dyn IntentClassifier>,
    slot_filler: Box<dyn SlotFiller>,
}

impl NluPipeline {
    pub fn new(
        dataset_params: DatasetParams,
        embeddings: EmbeddingSource,
        definition: Option<PipelineDefinition>,
        pretrained: PretrainedModels,
    ) -> Result<Self> {
        let definition = definition.unwrap_or_default();
        definition.validate()?;
        dataset_params.validate()?;

        let device = Device::Cpu;
        let encoder = Arc::new(EmbeddingEncoder::new(
            embeddings,
            &dataset_params,
            &definition,
            &device,
        )?);
        let dataset_params = Arc::new(dataset_params);
        let intent_classifier = ConvIntentClassifier::new(
            dataset_params.clone(),
            encoder.clone(),
            definition,
            &pretrained.classification,
        )?;
        let slot_filler = BiLstmSlotFiller::new(
            dataset_params.clone(),
            encoder.clone(),
            definition,
            &pretrained.ner,
        )?;
        info!(
            "NLU pipeline ready: {} intents, {} slot tags, {} words per sentence",
            dataset_params.nb_intents(),
            dataset_params.nb_slots(),
            dataset_params.max_words_per_sentence
        );

        Ok(Self {
            definition,
            dataset_params,
            encoder,
            intent_classifier: Box::new(intent_classifier),
            slot_filler: Box::new(slot_filler),
        })
    }

    /// Reloads a pipeline written by `persist`
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let directory = path.as_ref();
        Self::check_model_version(directory.join(METADATA_FILE))?;

        let dataset_params = DatasetParams::from_path(directory.join(DATASET_PARAMS_FILE))?;
        let definition = PipelineDefinition::from_path(directory.join(PIPELINE_DEFINITION_FILE))?;
        let ngram_to_id_path = directory.join(NGRAM_TO_ID_FILE);
        let ngram_to_id_file = fs::File::open(&ngram_to_id_path)
            .with_context(|_| NluError::ModelLoad(ngram_to_id_path.to_string_lossy().to_string()))?;
        let ngram_to_id = read_ngram_to_id(BufReader::new(ngram_to_id_file))
            .with_context(|_| format!("Invalid n-gram ids file {:?}", ngram_to_id_path))?;

        let paths = SavePaths::in_dir(directory);
        let ner = if paths.ner.exists() {
            ModelSource::Pretrained(paths.ner)
        } else if dataset_params.has_slots() {
            return Err(NluError::ModelLoad(paths.ner.to_string_lossy().to_string()).into());
        } else {
            ModelSource::Fresh
        };
        Self::new(
            dataset_params,
            EmbeddingSource::Pretrained {
                ngram_to_id,
                weights: paths.embedding,
            },
            Some(definition),
            PretrainedModels {
                classification: ModelSource::Pretrained(paths.classification),
                ner,
            },
        )
    }

    fn check_model_version<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        let metadata_file = fs::File::open(path)
            .with_context(|_| NluError::ModelLoad(path.to_string_lossy().to_string()))?;
        let model_version: ModelVersion = serde_json::from_reader(metadata_file)
            .with_context(|_| format!("Invalid metadata file {:?}", path))?;
        if model_version.model_version != crate::MODEL_VERSION {
            return Err(NluError::WrongModelVersion {
                model: model_version.model_version,
                runner: crate::MODEL_VERSION,
            }
            .into());
        }
        Ok(())
    }

    pub fn dataset_params(&self) -> &DatasetParams {
        &self.dataset_params
    }

    pub fn definition(&self) -> &PipelineDefinition {
        &self.definition
    }

    /// Slot tagging is only performed when the dataset has slots besides `O`
    pub fn has_slots(&self) -> bool {
        self.dataset_params.has_slots()
    }
}

impl NluPipeline {
    pub fn train(
        &mut self,
        data: &TrainingExamples,
        handler: &mut dyn TrainStatsHandler,
    ) -> Result<PipelineTrainingReport> {
        info!("Training the intent classifier ...");
        let classification = self
            .intent_classifier
            .train(data, &mut |stats| handler.classification(stats))?;
        let ner = if self.has_slots() {
            info!("Training the slot tagger ...");
            Some(
                self.slot_filler
                    .train(data, &mut |stats| handler.ner(stats))?,
            )
        } else {
            info!("No slots in the dataset, the slot tagger is not trained");
            None
        };
        Ok(PipelineTrainingReport {
            classification,
            ner,
        })
    }

    pub fn test(&self, data: &TestingExamples) -> Result<PipelineTestStats> {
        let classification_stats = self.intent_classifier.test(data)?;
        let ner_stats = if self.has_slots() {
            self.slot_filler.test(data)?
        } else {
            PredictionStats::default()
        };
        Ok(PipelineTestStats {
            classification_stats,
            ner_stats,
        })
    }

    pub fn predict(&self, sentences: &[String]) -> Result<PipelinePrediction> {
        let classification = self.intent_classifier.predict(sentences)?;
        let ner = if self.has_slots() {
            self.slot_filler.predict(sentences, &classification)?
        } else {
            vec![]
        };
        Ok(PipelinePrediction {
            classification,
            ner,
        })
    }

    /// Writes the weights, each file is replaced atomically
    pub fn save(&self, paths: &SavePaths) -> Result<()> {
        self.intent_classifier.save(&paths.classification)?;
        if self.has_slots() {
            self.slot_filler.save(&paths.ner)?;
        } else {
            info!("No slots in the dataset, the slot tagger is not saved");
        }
        self.encoder.save(&paths.embedding)?;
        info!("Pipeline weights saved");
        Ok(())
    }

    /// Writes everything `from_path` needs into `directory`
    pub fn persist<P: AsRef<Path>>(&self, directory: P) -> Result<()> {
        let directory = directory.as_ref();
        fs::create_dir_all(directory)
            .with_context(|_| format!("Cannot create directory {:?}", directory))?;
        self.save(&SavePaths::in_dir(directory))?;
        write_json(
            directory.join(DATASET_PARAMS_FILE),
            self.dataset_params.as_ref(),
        )?;
        write_json(directory.join(PIPELINE_DEFINITION_FILE), &self.definition)?;
        write_atomically(directory.join(NGRAM_TO_ID_FILE), |temp_path| {
            let mut writer = BufWriter::new(fs::File::create(temp_path)?);
            write_ngram_to_id(self.encoder.ngram_to_id(), &mut writer)?;
            writer.flush()?;
            Ok(())
        })?;
        write_json(
            directory.join(METADATA_FILE),
            &ModelVersion {
                model_version: crate::MODEL_VERSION.to_string(),
            },
        )?;
        info!("Pipeline persisted in {:?}", directory);
        Ok(())
    }
}
