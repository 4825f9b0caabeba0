//! Message dispatch.
//!
//! Routes one inbound payload to its handler sequence:
//! - admission: upsert demographics
//! - result: snapshot → features → classifier → (page) → append measurement
//! - other: nothing
//!
//! Every path that returns `Ok` is followed by exactly one accept
//! acknowledgment from the session loop. Any `Err` ends the session before
//! an acknowledgment is sent for that message.
//!
//! # Example
//!
//! ```ignore
//! use aki_client::dispatch::Dispatcher;
//! use aki_client::risk::ThresholdClassifier;
//!
//! let dispatcher = Dispatcher::new(ThresholdClassifier::default(), pager);
//! let outcome = dispatcher.dispatch(&mut store, &frame).await?;
//! ```

use tracing::debug;

use crate::error::Result;
use crate::message::{parse_message, Admission, LabResult, MessageBody, MessageKind};
use crate::pager::PagerHandle;
use crate::protocol::{AckCode, Frame};
use crate::risk::{CreatinineFeatures, FeatureTransform, RiskClassifier, RiskDecision};
use crate::store::PatientStore;

/// What a dispatch did, for the acknowledgment and for logging.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOutcome {
    pub kind: MessageKind,
    /// MSH-10 of the inbound message, echoed in the acknowledgment.
    pub control_id: Option<String>,
    pub mrn: Option<String>,
    /// Classifier decision, for result messages.
    pub decision: Option<RiskDecision>,
    /// Whether a new measurement row was written, for result messages.
    pub recorded: Option<bool>,
}

impl DispatchOutcome {
    /// Acknowledgment code for this message.
    pub fn ack_code(&self) -> AckCode {
        AckCode::Accept
    }
}

/// Routes payloads to the store and external adapters.
pub struct Dispatcher {
    features: Box<dyn FeatureTransform>,
    classifier: Box<dyn RiskClassifier>,
    pager: PagerHandle,
}

impl Dispatcher {
    /// Dispatcher using the default creatinine features.
    pub fn new<C>(classifier: C, pager: PagerHandle) -> Self
    where
        C: RiskClassifier + 'static,
    {
        Self {
            features: Box::new(CreatinineFeatures),
            classifier: Box::new(classifier),
            pager,
        }
    }

    /// Dispatcher with a boxed classifier (chosen at runtime).
    pub fn with_boxed_classifier(classifier: Box<dyn RiskClassifier>, pager: PagerHandle) -> Self {
        Self {
            features: Box::new(CreatinineFeatures),
            classifier,
            pager,
        }
    }

    /// Replace the feature transform.
    pub fn with_features<F>(mut self, features: F) -> Self
    where
        F: FeatureTransform + 'static,
    {
        self.features = Box::new(features);
        self
    }

    /// Process one payload against `store`.
    pub async fn dispatch(&self, store: &mut PatientStore, frame: &Frame) -> Result<DispatchOutcome> {
        let message = parse_message(frame.text()?)?;
        let kind = message.kind();
        let mrn = message.mrn().map(str::to_string);

        let (decision, recorded) = match &message.body {
            MessageBody::Admission(admission) => {
                self.handle_admission(store, admission)?;
                (None, None)
            }
            MessageBody::Result(result) => {
                let (decision, recorded) = self.handle_result(store, result).await?;
                (Some(decision), Some(recorded))
            }
            MessageBody::Other => {
                debug!("Ignoring {} message", message.message_type);
                (None, None)
            }
        };

        Ok(DispatchOutcome {
            kind,
            control_id: message.control_id,
            mrn,
            decision,
            recorded,
        })
    }

    fn handle_admission(&self, store: &mut PatientStore, admission: &Admission) -> Result<()> {
        debug!(mrn = %admission.mrn, "Admission");
        store.upsert_demographics(&admission.mrn, admission.dob, admission.sex.as_deref())
    }

    async fn handle_result(
        &self,
        store: &mut PatientStore,
        result: &LabResult,
    ) -> Result<(RiskDecision, bool)> {
        let snapshot = store.snapshot(&result.mrn)?;
        let features = self.features.transform(result, &snapshot)?;
        let decision = self.classifier.classify(&features)?;

        debug!(
            mrn = %result.mrn,
            value = result.value,
            previous = ?snapshot.latest_measurement,
            ?decision,
            "Lab result classified"
        );

        if decision.is_positive() {
            self.pager.page(&result.mrn).await?;
        }

        let recorded = store.append_measurement(&result.mrn, result.observed_at, result.value)?;
        if !recorded {
            debug!(mrn = %result.mrn, "Duplicate result, measurement already stored");
        }

        Ok((decision, recorded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use crate::pager::{spawn_pager_task_default, BoxFuture, Notifier};
    use crate::risk::{FeatureVector, ThresholdClassifier};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Recorder {
        paged: Arc<Mutex<Vec<String>>>,
    }

    impl Notifier for Recorder {
        fn page(&self, mrn: &str) -> BoxFuture<'static, Result<()>> {
            self.paged.lock().unwrap().push(mrn.to_string());
            Box::pin(async { Ok::<(), ClientError>(()) })
        }
    }

    /// Classifier that answers a fixed decision and counts calls.
    #[derive(Clone)]
    struct Fixed {
        decision: RiskDecision,
        calls: Arc<Mutex<Vec<FeatureVector>>>,
    }

    impl Fixed {
        fn new(decision: RiskDecision) -> Self {
            Self {
                decision,
                calls: Arc::default(),
            }
        }
    }

    impl RiskClassifier for Fixed {
        fn classify(&self, features: &FeatureVector) -> Result<RiskDecision> {
            self.calls.lock().unwrap().push(features.clone());
            Ok(self.decision)
        }
    }

    fn admission(mrn: &str, sex: &str) -> Frame {
        Frame::from_slice(
            format!(
                "MSH|^~\\&|SIMULATION|SOUTH RIVERSIDE|||20240101000000||ADT^A01|||2.5\rPID|1||{}||NAME||19900101|{}",
                mrn, sex
            )
            .as_bytes(),
        )
    }

    fn result(mrn: &str, value: f64) -> Frame {
        Frame::from_slice(
            format!(
                "MSH|^~\\&|SIMULATION|SOUTH RIVERSIDE|||20240102090000||ORU^R01|R1|P|2.5\rPID|1||{}\rOBR|1||||||20240102090000\rOBX|1|SN|CREATININE||{}",
                mrn, value
            )
            .as_bytes(),
        )
    }

    fn setup(decision: RiskDecision) -> (Dispatcher, Fixed, Recorder, PatientStore) {
        let recorder = Recorder::default();
        let (pager, _task) = spawn_pager_task_default(recorder.clone());
        let classifier = Fixed::new(decision);
        let dispatcher = Dispatcher::new(classifier.clone(), pager);
        (dispatcher, classifier, recorder, PatientStore::in_memory().unwrap())
    }

    #[tokio::test]
    async fn test_admission_upserts() {
        let (dispatcher, classifier, _recorder, mut store) = setup(RiskDecision::Negative);

        let outcome = dispatcher.dispatch(&mut store, &admission("123", "M")).await.unwrap();

        assert_eq!(outcome.kind, MessageKind::Admission);
        assert_eq!(outcome.mrn.as_deref(), Some("123"));
        assert_eq!(outcome.ack_code(), AckCode::Accept);
        assert_eq!(store.patient("123").unwrap().unwrap().sex.as_deref(), Some("M"));
        assert!(classifier.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_result_negative_records_without_page() {
        let recorder = Recorder::default();
        let (pager, task) = spawn_pager_task_default(recorder.clone());
        let classifier = Fixed::new(RiskDecision::Negative);
        let dispatcher = Dispatcher::new(classifier.clone(), pager);
        let mut store = PatientStore::in_memory().unwrap();
        dispatcher.dispatch(&mut store, &admission("123", "M")).await.unwrap();

        let outcome = dispatcher.dispatch(&mut store, &result("123", 7.5)).await.unwrap();
        drop(dispatcher);
        task.await.unwrap();

        assert_eq!(outcome.decision, Some(RiskDecision::Negative));
        assert_eq!(outcome.recorded, Some(true));
        assert_eq!(outcome.control_id.as_deref(), Some("R1"));
        assert_eq!(store.measurement_count().unwrap(), 1);
        assert!(recorder.paged.lock().unwrap().is_empty());

        // absent history: previous equals current
        let calls = classifier.calls.lock().unwrap();
        assert_eq!(calls[0].as_slice()[3], 7.5);
    }

    #[tokio::test]
    async fn test_result_positive_pages() {
        let recorder = Recorder::default();
        let (pager, task) = spawn_pager_task_default(recorder.clone());
        let dispatcher = Dispatcher::new(Fixed::new(RiskDecision::Positive), pager);
        let mut store = PatientStore::in_memory().unwrap();
        dispatcher.dispatch(&mut store, &admission("123", "F")).await.unwrap();

        dispatcher.dispatch(&mut store, &result("123", 7.5)).await.unwrap();
        drop(dispatcher);
        task.await.unwrap();

        assert_eq!(*recorder.paged.lock().unwrap(), vec!["123"]);
        assert_eq!(store.measurement_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_replayed_result_classified_again() {
        let (dispatcher, classifier, _recorder, mut store) = setup(RiskDecision::Negative);
        dispatcher.dispatch(&mut store, &admission("123", "M")).await.unwrap();

        dispatcher.dispatch(&mut store, &result("123", 7.5)).await.unwrap();
        let replay = dispatcher.dispatch(&mut store, &result("123", 7.5)).await.unwrap();

        assert_eq!(replay.recorded, Some(false));
        assert_eq!(store.measurement_count().unwrap(), 1);
        assert_eq!(classifier.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_result_for_unknown_patient() {
        let (dispatcher, classifier, _recorder, mut store) = setup(RiskDecision::Positive);

        let err = dispatcher.dispatch(&mut store, &result("404", 7.5)).await.unwrap_err();

        assert!(matches!(err, ClientError::NotFound(_)));
        assert!(classifier.calls.lock().unwrap().is_empty());
        assert_eq!(store.measurement_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_other_message_touches_nothing() {
        let (dispatcher, classifier, _recorder, mut store) = setup(RiskDecision::Positive);
        let discharge = Frame::from_slice(b"MSH|^~\\&|||||20240101||ADT^A03|D9||2.5\rPID|1||123");

        let outcome = dispatcher.dispatch(&mut store, &discharge).await.unwrap();

        assert_eq!(outcome.kind, MessageKind::Other);
        assert_eq!(outcome.control_id.as_deref(), Some("D9"));
        assert_eq!(store.patient_count().unwrap(), 0);
        assert!(classifier.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_message_is_dispatch_error() {
        let (dispatcher, _classifier, _recorder, mut store) = setup(RiskDecision::Negative);

        let err = dispatcher
            .dispatch(&mut store, &Frame::from_slice(b"garbage"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Dispatch(_)));
    }

    /// Transform that ignores its input.
    struct Constant(Vec<f64>);

    impl FeatureTransform for Constant {
        fn transform(
            &self,
            _result: &LabResult,
            _snapshot: &crate::store::PatientSnapshot,
        ) -> Result<FeatureVector> {
            Ok(FeatureVector(self.0.clone()))
        }
    }

    #[tokio::test]
    async fn test_custom_features_reach_classifier() {
        let (pager, _task) = spawn_pager_task_default(Recorder::default());
        let classifier = Fixed::new(RiskDecision::Negative);
        let dispatcher = Dispatcher::new(classifier.clone(), pager)
            .with_features(Constant(vec![1.0, 2.0]));
        let mut store = PatientStore::in_memory().unwrap();
        dispatcher.dispatch(&mut store, &admission("123", "M")).await.unwrap();

        dispatcher.dispatch(&mut store, &result("123", 7.5)).await.unwrap();

        assert_eq!(
            *classifier.calls.lock().unwrap(),
            vec![FeatureVector(vec![1.0, 2.0])]
        );
    }

    #[tokio::test]
    async fn test_default_threshold_end_to_end() {
        let recorder = Recorder::default();
        let (pager, task) = spawn_pager_task_default(recorder.clone());
        let dispatcher = Dispatcher::new(ThresholdClassifier::default(), pager);
        let mut store = PatientStore::in_memory().unwrap();

        dispatcher.dispatch(&mut store, &admission("9", "F")).await.unwrap();
        dispatcher.dispatch(&mut store, &result("9", 80.0)).await.unwrap();
        let spike = dispatcher.dispatch(&mut store, &result("9", 200.0)).await.unwrap();
        drop(dispatcher);
        task.await.unwrap();

        assert_eq!(spike.decision, Some(RiskDecision::Positive));
        assert_eq!(*recorder.paged.lock().unwrap(), vec!["9"]);
    }
}
