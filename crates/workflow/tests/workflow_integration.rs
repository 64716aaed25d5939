//! Integration tests: engines → event store → read models, with a pinned clock.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use common::{Actor, AggregateId, Clock, FixedClock, Role, UserId};
use domain::{
    Aggregate, ApplicantDocuments, ApplicantProfile, ApplicationForm, ErrorKind, ExamResult,
    ExamTypeId, Gender, ImportantInfoUpdate, InMemoryCatalog, License, LicenseKind, LicenseStatus,
    LicenseTypeId, Money, RequestStatus, ReviewDecision, UnitOfWork, load_aggregate,
};
use event_store::InMemoryEventStore;
use workflow::{
    BlobError, BlobStore, BundleItem, Collaborators, FileUpload, InMemoryBlobStore, InMemoryNotifier,
    InMemoryViolations, Licensing, RenewalApplication, ReplacementApplication,
    ReplacementApproval, UploadPurpose, ViolationStatus, ViolationSummary, WorkflowError,
};

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

struct Harness {
    licensing: Licensing<InMemoryEventStore>,
    clock: FixedClock,
    notifier: InMemoryNotifier,
    blobs: InMemoryBlobStore,
    violations: InMemoryViolations,
    officer: Actor,
    admin: Actor,
}

impl Harness {
    fn new() -> Self {
        let blobs = InMemoryBlobStore::new();
        Self::build(InMemoryEventStore::new(), blobs.clone(), Arc::new(blobs))
    }

    /// `blobs` is what assertions inspect; `blob_store` is what the engines use.
    fn build(
        store: InMemoryEventStore,
        blobs: InMemoryBlobStore,
        blob_store: Arc<dyn BlobStore>,
    ) -> Self {
        let clock = FixedClock::new(start());
        let notifier = InMemoryNotifier::new();
        let violations = InMemoryViolations::new();

        let licensing = Licensing::new(
            store,
            Collaborators {
                catalog: Arc::new(InMemoryCatalog::seeded()),
                clock: Arc::new(clock.clone()),
                notifier: Arc::new(notifier.clone()),
                blobs: blob_store,
                violations: Arc::new(violations.clone()),
            },
        );

        Self {
            licensing,
            clock,
            notifier,
            blobs,
            violations,
            officer: Actor::new(UserId::new(), Role::LicenseOfficer),
            admin: Actor::new(UserId::new(), Role::SuperAdmin),
        }
    }

    fn form(birth_date: NaiveDate, type_id: u32, category: Option<&str>) -> ApplicationForm {
        ApplicationForm {
            profile: ApplicantProfile {
                full_name: "  Sara Haddad ".into(),
                birth_date,
                gender: Gender::Female,
                passport_number: "P4410027".into(),
                nationality: Some("JO".into()),
                blood_type: None,
                email: None,
                place_of_birth: None,
                residence_address: None,
            },
            documents: ApplicantDocuments {
                photo: Some("uploads/000001.jpg".into()),
                ..ApplicantDocuments::default()
            },
            license_type_id: Some(LicenseTypeId(type_id)),
            kind: None,
            category: category.map(str::to_string),
        }
    }

    async fn apply(&self, citizen: &Actor) -> AggregateId {
        let license = self
            .licensing
            .applications
            .apply(citizen, Self::form(date(1990, 5, 4), 1, Some("b")))
            .await
            .unwrap();
        license.id().unwrap()
    }

    async fn approve(&self, license_id: AggregateId) {
        let outcome = self
            .licensing
            .applications
            .review(&self.officer, license_id, ReviewDecision::Approved, None)
            .await
            .unwrap();
        self.licensing.dispatcher.deliver(outcome).await;
    }

    async fn schedule(&self, license_id: AggregateId, exam_type: u32) -> AggregateId {
        let outcome = self
            .licensing
            .exams
            .schedule(
                &self.officer,
                license_id,
                ExamTypeId(exam_type),
                start() + Duration::days(2),
            )
            .await
            .unwrap();
        self.licensing.dispatcher.deliver(outcome).await.id().unwrap()
    }

    async fn grade(&self, exam_id: AggregateId, result: ExamResult) {
        let outcome = self
            .licensing
            .exams
            .submit_result(&self.officer, exam_id, result, Some(85), None)
            .await
            .unwrap();
        self.licensing.dispatcher.deliver(outcome).await;
    }

    /// Applies, approves and passes all three exams.
    async fn issued_license(&self, citizen: &Actor) -> AggregateId {
        let license_id = self.apply(citizen).await;
        self.approve(license_id).await;
        for exam_type in 1..=3 {
            let exam_id = self.schedule(license_id, exam_type).await;
            self.grade(exam_id, ExamResult::Passed).await;
        }
        license_id
    }

    async fn license(&self, license_id: AggregateId) -> License {
        self.licensing
            .applications
            .get(&self.officer, license_id)
            .await
            .unwrap()
    }
}

fn kind_of<T: std::fmt::Debug>(result: Result<T, WorkflowError>) -> ErrorKind {
    result.unwrap_err().kind()
}

#[tokio::test]
async fn test_third_degree_requires_exact_age() {
    let h = Harness::new();
    let apply = |birth: NaiveDate| {
        let citizen = Actor::citizen(UserId::new());
        let form = Harness::form(birth, 3, None);
        let licensing = &h.licensing;
        async move { licensing.applications.apply(&citizen, form).await }
    };

    // 27, 28 and 29 on 2025-03-10.
    assert_eq!(kind_of(apply(date(1997, 6, 1)).await), ErrorKind::Ineligible);
    let license = apply(date(1997, 3, 10)).await.unwrap();
    assert_eq!(license.age(), 28);
    assert_eq!(kind_of(apply(date(1995, 6, 1)).await), ErrorKind::Ineligible);
}

#[tokio::test]
async fn test_application_is_trimmed_and_listed() {
    let h = Harness::new();
    let citizen = Actor::citizen(UserId::new());
    let license_id = h.apply(&citizen).await;

    let mine = h.licensing.applications.list_mine(&citizen).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].profile().unwrap().full_name, "Sara Haddad");
    assert_eq!(mine[0].category(), Some("B"));
    assert_eq!(mine[0].status(), LicenseStatus::Pending);

    let pending = h.licensing.queries.pending(&h.officer).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].license_id, license_id);

    // A second application of the same type is blocked while one is open.
    let again = h
        .licensing
        .applications
        .apply(&citizen, Harness::form(date(1990, 5, 4), 1, Some("B")))
        .await;
    assert_eq!(kind_of(again), ErrorKind::Conflict);
}

#[tokio::test]
async fn test_license_reads_respect_ownership() {
    let h = Harness::new();
    let owner = Actor::citizen(UserId::new());
    let license_id = h.apply(&owner).await;

    assert!(h.licensing.applications.get(&owner, license_id).await.is_ok());
    assert!(h.licensing.applications.get(&h.admin, license_id).await.is_ok());

    let stranger = Actor::citizen(UserId::new());
    let err = h.licensing.applications.get(&stranger, license_id).await;
    assert_eq!(kind_of(err), ErrorKind::PermissionDenied);

    let police = Actor::new(UserId::new(), Role::TrafficPolice);
    let err = h.licensing.applications.get(&police, license_id).await;
    assert_eq!(kind_of(err), ErrorKind::PermissionDenied);

    let err = h.licensing.queries.pending(&owner).await;
    assert_eq!(kind_of(err), ErrorKind::PermissionDenied);
}

#[tokio::test]
async fn test_failed_exam_rejects_and_starts_cooldown() {
    let h = Harness::new();
    let citizen = Actor::citizen(UserId::new());
    let license_id = h.apply(&citizen).await;
    h.approve(license_id).await;

    let theory = h.schedule(license_id, 1).await;
    h.grade(theory, ExamResult::Passed).await;
    let practical = h.schedule(license_id, 2).await;
    h.grade(practical, ExamResult::Failed).await;

    let license = h.license(license_id).await;
    assert_eq!(license.status(), LicenseStatus::Rejected);
    assert!(license.rejection_reason().unwrap().starts_with("Failed Practical"));
    let kinds: Vec<_> = h
        .notifier
        .sent_to(citizen.id)
        .iter()
        .filter_map(|n| n.kind().map(str::to_string))
        .collect();
    assert!(kinds.contains(&"exam_failed".to_string()));

    h.clock.advance(Duration::days(3));
    let err = h
        .licensing
        .applications
        .apply(&citizen, Harness::form(date(1990, 5, 4), 1, Some("B")))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CooldownActive);
    assert_eq!(err.cooldown_days_remaining(), Some(4));

    h.clock.advance(Duration::days(5));
    assert!(
        h.licensing
            .applications
            .apply(&citizen, Harness::form(date(1990, 5, 4), 1, Some("B")))
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_third_pass_issues_license() {
    let h = Harness::new();
    let citizen = Actor::citizen(UserId::new());
    let license_id = h.apply(&citizen).await;
    h.approve(license_id).await;

    for exam_type in 1..=2 {
        let exam_id = h.schedule(license_id, exam_type).await;
        h.grade(exam_id, ExamResult::Passed).await;
    }
    assert!(h.license(license_id).await.license_number().is_none());

    let road = h.schedule(license_id, 3).await;
    h.grade(road, ExamResult::Passed).await;

    let license = h.license(license_id).await;
    assert_eq!(license.status(), LicenseStatus::Issued);
    let number = license.license_number().unwrap();
    assert!(number.starts_with("LIC") && number.len() == 11);
    assert_eq!(license.barcode().unwrap().len(), 16);
    assert_eq!(license.issued_date(), Some(date(2025, 3, 10)));
    assert_eq!(license.expiry_date(), Some(date(2035, 3, 10)));
    assert!(license.dept_approval().awaiting_submission());
    assert!(!license.is_printable(h.clock.today()));

    let issued: Vec<_> = h
        .notifier
        .sent_to(citizen.id)
        .into_iter()
        .filter(|n| n.kind() == Some("license_issued"))
        .collect();
    assert_eq!(issued.len(), 1);
    assert_eq!(
        issued[0].data.get("license_number").map(String::as_str),
        Some(number)
    );
}

#[tokio::test]
async fn test_concurrent_final_gradings_issue_once() {
    let h = Harness::new();
    let citizen = Actor::citizen(UserId::new());
    let license_id = h.apply(&citizen).await;
    h.approve(license_id).await;
    for exam_type in 1..=2 {
        let exam_id = h.schedule(license_id, exam_type).await;
        h.grade(exam_id, ExamResult::Passed).await;
    }
    let road = h.schedule(license_id, 3).await;

    let exams = &h.licensing.exams;
    let (first, second) = tokio::join!(
        exams.submit_result(&h.officer, road, ExamResult::Passed, None, None),
        exams.submit_result(&h.officer, road, ExamResult::Passed, None, None),
    );

    let outcomes = [first, second];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    let failed = outcomes.into_iter().find_map(Result::err).unwrap();
    assert!(matches!(
        failed.kind(),
        ErrorKind::Conflict | ErrorKind::InvalidTransition
    ));

    let license = h.license(license_id).await;
    assert!(license.license_number().is_some());
    assert_eq!(license.passed_exam_count(), 3);
}

#[tokio::test]
async fn test_approval_after_exams_issues_once() {
    let h = Harness::new();
    let citizen = Actor::citizen(UserId::new());
    let license_id = h.issued_license(&citizen).await;
    let number = h.license(license_id).await.license_number().map(str::to_string);

    // Reviewing an issued license is refused and leaves the number alone.
    let err = h
        .licensing
        .applications
        .review(&h.officer, license_id, ReviewDecision::Approved, None)
        .await;
    assert_eq!(kind_of(err), ErrorKind::InvalidTransition);
    assert_eq!(
        h.license(license_id).await.license_number().map(str::to_string),
        number
    );
}

#[tokio::test]
async fn test_citizen_cannot_schedule_exams() {
    let h = Harness::new();
    let citizen = Actor::citizen(UserId::new());
    let license_id = h.apply(&citizen).await;
    h.approve(license_id).await;

    let err = h
        .licensing
        .exams
        .schedule(&citizen, license_id, ExamTypeId(1), start())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Only license officers"));
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    let err = h
        .licensing
        .exams
        .schedule(&h.officer, license_id, ExamTypeId(42), start())
        .await;
    assert_eq!(kind_of(err), ErrorKind::Validation);
}

#[tokio::test]
async fn test_exams_require_approval() {
    let h = Harness::new();
    let citizen = Actor::citizen(UserId::new());
    let license_id = h.apply(&citizen).await;

    let err = h
        .licensing
        .exams
        .schedule(&h.officer, license_id, ExamTypeId(1), start())
        .await;
    assert_eq!(kind_of(err), ErrorKind::InvalidTransition);
}

#[tokio::test]
async fn test_bundle_reuses_open_exam_and_stops_at_first_failure() {
    let h = Harness::new();
    let citizen = Actor::citizen(UserId::new());
    let license_id = h.apply(&citizen).await;
    h.approve(license_id).await;
    let theory = h.schedule(license_id, 1).await;

    let later = start() + Duration::days(9);
    let outcome = h
        .licensing
        .exams
        .schedule_bundle(
            &h.officer,
            license_id,
            vec![
                BundleItem {
                    exam_type_id: ExamTypeId(1),
                    scheduled_date: later,
                },
                BundleItem {
                    exam_type_id: ExamTypeId(9),
                    scheduled_date: later,
                },
                BundleItem {
                    exam_type_id: ExamTypeId(2),
                    scheduled_date: later,
                },
            ],
        )
        .await
        .unwrap();
    let report = h.licensing.dispatcher.deliver(outcome).await;

    assert_eq!(report.scheduled.len(), 1);
    assert_eq!(report.scheduled[0].id(), Some(theory));
    assert_eq!(report.scheduled[0].scheduled_date(), Some(later));
    let failure = report.failure.unwrap();
    assert_eq!(failure.exam_type_id, ExamTypeId(9));
    assert_eq!(failure.kind, ErrorKind::Validation);

    let exams = h
        .licensing
        .applications
        .exams_for(&h.officer, license_id)
        .await
        .unwrap();
    assert_eq!(exams.len(), 1);
}

#[tokio::test]
async fn test_department_approval_flow() {
    let h = Harness::new();
    let citizen = Actor::citizen(UserId::new());
    let license_id = h.issued_license(&citizen).await;
    let dept = &h.licensing.dept_approval;

    let err = dept.approve(&h.admin, license_id, None).await;
    assert_eq!(kind_of(err), ErrorKind::InvalidTransition);
    let err = dept.submit(&citizen, license_id).await;
    assert_eq!(kind_of(err), ErrorKind::PermissionDenied);

    dept.submit(&h.officer, license_id).await.unwrap();
    let err = dept.submit(&h.officer, license_id).await.unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::Domain(domain::DomainError::License(
            domain::LicenseError::AlreadySubmitted
        ))
    ));
    assert_eq!(
        h.licensing.queries.signature_pending(&h.officer).await.unwrap().len(),
        1
    );

    let err = dept
        .approve(
            &h.admin,
            license_id,
            Some(FileUpload::new(b"%PDF".to_vec(), "application/pdf")),
        )
        .await;
    assert_eq!(kind_of(err), ErrorKind::Validation);
    assert_eq!(h.blobs.blob_count(), 0);

    let err = dept.approve(&h.officer, license_id, None).await;
    assert_eq!(kind_of(err), ErrorKind::PermissionDenied);

    let license = dept
        .approve(
            &h.admin,
            license_id,
            Some(FileUpload::new(vec![0x89, 0x50], "image/png")),
        )
        .await
        .unwrap();
    let handle = license.dept_approval().signature.clone().unwrap();
    assert!(h.blobs.get(&handle).is_some());
    assert!(license.is_printable(h.clock.today()));

    let err = dept.approve(&h.admin, license_id, None).await;
    assert_eq!(kind_of(err), ErrorKind::InvalidTransition);
    let err = dept.submit(&h.officer, license_id).await;
    assert_eq!(kind_of(err), ErrorKind::InvalidTransition);

    let printable = h.licensing.queries.printable(&h.officer).await.unwrap();
    assert_eq!(printable.len(), 1);
}

#[tokio::test]
async fn test_signature_store_failure_still_approves() {
    let h = Harness::new();
    let citizen = Actor::citizen(UserId::new());
    let license_id = h.issued_license(&citizen).await;
    h.licensing
        .dept_approval
        .submit(&h.officer, license_id)
        .await
        .unwrap();

    h.blobs.set_fail(true);
    let license = h
        .licensing
        .dept_approval
        .approve(
            &h.admin,
            license_id,
            Some(FileUpload::new(vec![1, 2, 3], "image/jpeg")),
        )
        .await
        .unwrap();

    assert!(license.dept_approval().is_approved());
    assert!(license.dept_approval().signature.is_none());
}

/// Stores the signature, then lets another admin approve the license
/// before the engine commits.
struct ConcurrentApproval {
    blobs: InMemoryBlobStore,
    store: InMemoryEventStore,
    license_id: OnceLock<AggregateId>,
}

#[async_trait]
impl BlobStore for ConcurrentApproval {
    async fn store(&self, bytes: &[u8], suggested_ext: &str) -> Result<String, BlobError> {
        let handle = self.blobs.store(bytes, suggested_ext).await?;
        if let Some(&license_id) = self.license_id.get() {
            let other = Actor::new(UserId::new(), Role::SuperAdmin);
            let mut license: License = load_aggregate(&self.store, license_id).await.unwrap();
            let events = license.grant_dept_approval(other.id, None, start()).unwrap();
            let mut work = UnitOfWork::new(other, start());
            work.record(license_id, &mut license, events).unwrap();
            work.commit(&self.store).await.unwrap();
        }
        Ok(handle)
    }

    async fn remove(&self, handle: &str) -> Result<(), BlobError> {
        self.blobs.remove(handle).await
    }
}

#[tokio::test]
async fn test_lost_approval_race_removes_signature() {
    let store = InMemoryEventStore::new();
    let blobs = InMemoryBlobStore::new();
    let racing = Arc::new(ConcurrentApproval {
        blobs: blobs.clone(),
        store: store.clone(),
        license_id: OnceLock::new(),
    });
    let h = Harness::build(store, blobs, racing.clone());

    let citizen = Actor::citizen(UserId::new());
    let license_id = h.issued_license(&citizen).await;
    h.licensing
        .dept_approval
        .submit(&h.officer, license_id)
        .await
        .unwrap();
    racing.license_id.set(license_id).unwrap();

    let err = h
        .licensing
        .dept_approval
        .approve(
            &h.admin,
            license_id,
            Some(FileUpload::new(vec![0x89, 0x50], "image/png")),
        )
        .await;
    assert_eq!(kind_of(err), ErrorKind::Conflict);
    assert_eq!(h.blobs.blob_count(), 0);

    let license = h.license(license_id).await;
    assert!(license.dept_approval().is_approved());
    assert!(license.dept_approval().signature.is_none());
}

#[tokio::test]
async fn test_renewal_lifecycle() {
    let h = Harness::new();
    let citizen = Actor::citizen(UserId::new());
    let license_id = h.issued_license(&citizen).await;
    let renewals = &h.licensing.renewals;
    let application = || RenewalApplication {
        license_id,
        new_photo: Some("uploads/000042.jpg".into()),
        notes: None,
    };

    let err = renewals.apply(&citizen, application()).await;
    assert_eq!(kind_of(err), ErrorKind::InvalidTransition);

    h.clock.set(Utc.with_ymd_and_hms(2035, 3, 11, 9, 0, 0).unwrap());
    assert_eq!(
        h.license(license_id).await.effective_status(h.clock.today()),
        LicenseStatus::Expired
    );

    let renewal = renewals.apply(&citizen, application()).await.unwrap();
    let renewal_id = renewal.id().unwrap();
    assert!(renewal.tracking_code().starts_with("REN"));
    assert_eq!(renewal.old_expiry_date(), Some(date(2035, 3, 10)));

    let err = renewals.apply(&citizen, application()).await;
    assert_eq!(kind_of(err), ErrorKind::Conflict);

    let err = renewals.approve(&h.officer, renewal_id, false, None).await;
    assert_eq!(kind_of(err), ErrorKind::PaymentNotConfirmed);
    let err = renewals.approve(&h.officer, renewal_id, true, None).await;
    assert_eq!(kind_of(err), ErrorKind::InvalidTransition);
    let err = renewals
        .submit_vision_exam_result(&h.officer, renewal_id, ExamResult::Passed, None)
        .await;
    assert_eq!(kind_of(err), ErrorKind::InvalidTransition);

    let outcome = renewals
        .schedule_vision_exam(&h.officer, renewal_id, h.clock.now() + Duration::days(1))
        .await
        .unwrap();
    assert_eq!(
        outcome.effects[0].data.get("fee").map(String::as_str),
        Some("8.50")
    );
    h.licensing.dispatcher.deliver(outcome).await;
    let outcome = renewals
        .submit_vision_exam_result(&h.officer, renewal_id, ExamResult::Passed, None)
        .await
        .unwrap();
    h.licensing.dispatcher.deliver(outcome).await;

    let approved = renewals
        .approve(&h.officer, renewal_id, true, Some("ok".into()))
        .await
        .unwrap();
    assert_eq!(approved.status(), RequestStatus::Approved);
    assert_eq!(approved.fee(), Money::from_cents(850));

    let license = h.license(license_id).await;
    assert_eq!(license.effective_status(h.clock.today()), LicenseStatus::Issued);
    assert_eq!(license.issued_date(), Some(date(2035, 3, 11)));
    assert_eq!(license.expiry_date(), Some(date(2045, 3, 11)));
    assert_eq!(license.documents().photo.as_deref(), Some("uploads/000042.jpg"));
    assert!(license.dept_approval().awaiting_submission());

    let mine = h.licensing.queries.my_renewals(&citizen).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].status, RequestStatus::Approved);
}

#[tokio::test]
async fn test_rejected_renewal_unblocks_new_request() {
    let h = Harness::new();
    let citizen = Actor::citizen(UserId::new());
    let license_id = h.issued_license(&citizen).await;
    h.clock.set(Utc.with_ymd_and_hms(2036, 1, 1, 9, 0, 0).unwrap());
    let application = || RenewalApplication {
        license_id,
        new_photo: Some("uploads/000007.jpg".into()),
        notes: Some("moved house".into()),
    };

    let first = h
        .licensing
        .renewals
        .apply(&citizen, application())
        .await
        .unwrap();
    h.licensing
        .renewals
        .reject(&h.officer, first.id().unwrap(), Some("blurry photo".into()))
        .await
        .unwrap();

    let second = h.licensing.renewals.apply(&citizen, application()).await;
    assert!(second.is_ok());
    assert_eq!(
        h.licensing
            .queries
            .renewals(&h.officer, Some(RequestStatus::Rejected))
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn test_replacement_rotates_barcode() {
    let h = Harness::new();
    let citizen = Actor::citizen(UserId::new());
    let license_id = h.issued_license(&citizen).await;
    let before = h.license(license_id).await;
    let old_barcode = before.barcode().unwrap().to_string();
    let replacements = &h.licensing.replacements;

    let err = replacements
        .apply(
            &citizen,
            ReplacementApplication {
                license_id,
                police_report: None,
                notes: None,
            },
        )
        .await;
    assert_eq!(kind_of(err), ErrorKind::Validation);

    let replacement = replacements
        .apply(
            &citizen,
            ReplacementApplication {
                license_id,
                police_report: Some("uploads/000009.pdf".into()),
                notes: Some("lost at the market".into()),
            },
        )
        .await
        .unwrap();
    let replacement_id = replacement.id().unwrap();
    let payment_code = replacement.payment_code().to_string();
    assert!(payment_code.starts_with("PAY"));
    assert!(replacement.tracking_code().starts_with("LOS"));

    let pending = h
        .licensing
        .queries
        .pending_replacements(&h.officer)
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert!(pending[0].payment_code.is_none());
    let mine = h.licensing.queries.my_replacements(&citizen).await.unwrap();
    assert_eq!(mine[0].payment_code.as_deref(), Some(payment_code.as_str()));

    let err = replacements
        .approve(
            &h.officer,
            replacement_id,
            ReplacementApproval {
                payment_confirmed: true,
                payment_code: "PAY00000000".into(),
                notes: None,
            },
        )
        .await;
    assert_eq!(kind_of(err), ErrorKind::PaymentCodeMismatch);
    assert_eq!(h.license(license_id).await.barcode(), Some(old_barcode.as_str()));

    let approved = replacements
        .approve(
            &h.officer,
            replacement_id,
            ReplacementApproval {
                payment_confirmed: true,
                payment_code: format!("  {payment_code} "),
                notes: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(approved.status(), RequestStatus::Approved);
    assert_eq!(approved.old_barcode(), Some(old_barcode.as_str()));

    let after = h.license(license_id).await;
    let new_barcode = after.barcode().unwrap();
    assert_ne!(new_barcode, old_barcode);
    assert_eq!(approved.new_barcode(), Some(new_barcode));
    assert_eq!(after.license_number(), before.license_number());
    assert_ne!(after.public_token(), before.public_token());
    assert!(after.dept_approval().awaiting_signature());

    let err = h.licensing.verification.verify(&old_barcode).await;
    assert_eq!(kind_of(err), ErrorKind::NotFound);
    assert!(h.licensing.verification.verify(new_barcode).await.is_ok());

    let again = replacements
        .apply(
            &citizen,
            ReplacementApplication {
                license_id,
                police_report: Some("uploads/000010.pdf".into()),
                notes: None,
            },
        )
        .await;
    assert_eq!(kind_of(again), ErrorKind::Conflict);
}

#[tokio::test]
async fn test_verification_reports_open_violations() {
    let h = Harness::new();
    let citizen = Actor::citizen(UserId::new());
    let license_id = h.issued_license(&citizen).await;
    let barcode = h.license(license_id).await.barcode().unwrap().to_string();

    let violation = |status| ViolationSummary {
        violation_type: "Speeding".into(),
        fine: Money::from_cents(5000),
        status,
        recorded_at: start(),
    };
    h.violations.record(license_id, violation(ViolationStatus::Pending));
    h.violations.record(license_id, violation(ViolationStatus::Paid));
    h.violations.record(license_id, violation(ViolationStatus::Appealed));

    h.licensing
        .applications
        .update_important_info(
            &citizen,
            license_id,
            ImportantInfoUpdate {
                chronic_disease: Some("asthma".into()),
                ..ImportantInfoUpdate::default()
            },
        )
        .await
        .unwrap();

    let report = h.licensing.verification.verify(&barcode).await.unwrap();
    assert_eq!(report.full_name.as_deref(), Some("Sara Haddad"));
    assert_eq!(report.status, LicenseStatus::Issued);
    assert!(!report.is_expired);
    assert_eq!(report.open_violation_count, 2);
    assert_eq!(report.important_info.chronic_disease.as_deref(), Some("asthma"));

    let officer_view = h
        .licensing
        .applications
        .by_barcode(&Actor::new(UserId::new(), Role::TrafficPolice), &barcode)
        .await
        .unwrap();
    assert_eq!(officer_view.id(), Some(license_id));

    h.clock.set(Utc.with_ymd_and_hms(2036, 1, 1, 0, 0, 0).unwrap());
    let report = h.licensing.verification.verify(&barcode).await.unwrap();
    assert!(report.is_expired);
    assert_eq!(report.status, LicenseStatus::Expired);
}

#[tokio::test]
async fn test_important_info_rules() {
    let h = Harness::new();
    let citizen = Actor::citizen(UserId::new());
    let license_id = h.apply(&citizen).await;
    let update = ImportantInfoUpdate {
        emergency_contact_name: Some("Omar".into()),
        ..ImportantInfoUpdate::default()
    };

    let err = h
        .licensing
        .applications
        .update_important_info(&citizen, license_id, update.clone())
        .await;
    assert_eq!(kind_of(err), ErrorKind::InvalidTransition);

    let err = h
        .licensing
        .applications
        .update_important_info(&citizen, license_id, ImportantInfoUpdate::default())
        .await;
    assert_eq!(kind_of(err), ErrorKind::Validation);

    let stranger = Actor::citizen(UserId::new());
    let err = h
        .licensing
        .applications
        .update_important_info(&stranger, license_id, update)
        .await;
    assert_eq!(kind_of(err), ErrorKind::PermissionDenied);
}

#[tokio::test]
async fn test_notification_failure_does_not_fail_operation() {
    let h = Harness::new();
    let citizen = Actor::citizen(UserId::new());
    let license_id = h.apply(&citizen).await;
    h.notifier.set_fail(true);

    let outcome = h
        .licensing
        .applications
        .review(&h.officer, license_id, ReviewDecision::Approved, None)
        .await
        .unwrap();
    let report = h.licensing.dispatcher.dispatch(outcome.effects).await;

    assert_eq!(report.sent, 0);
    assert_eq!(report.failed, 1);
    assert_eq!(h.license(license_id).await.status(), LicenseStatus::Approved);
}

#[tokio::test]
async fn test_uploads_and_health_counts() {
    let h = Harness::new();
    let citizen = Actor::citizen(UserId::new());
    let stored = h
        .licensing
        .uploads
        .upload(
            &citizen,
            UploadPurpose::Photo,
            FileUpload::new(vec![0xFF, 0xD8], "image/jpeg"),
        )
        .await
        .unwrap();
    assert!(stored.handle.ends_with(".jpg"));

    h.apply(&citizen).await;
    h.licensing.queries.all(&h.officer, None).await.unwrap();
    let counts = h.licensing.read_model_counts();
    assert!(counts.contains(&("LicenseQueuesView", 1)));
    assert!(counts.contains(&("RequestDeskView", 0)));
}

#[tokio::test]
async fn test_legacy_kind_application_scoped_to_that_kind() {
    let h = Harness::new();
    let citizen = Actor::citizen(UserId::new());
    let license_id = h.issued_license(&citizen).await;
    assert_eq!(h.license(license_id).await.kind(), LicenseKind::Private);

    let legacy = |kind| ApplicationForm {
        license_type_id: None,
        kind: Some(kind),
        category: None,
        ..Harness::form(date(1990, 5, 4), 1, None)
    };

    let motorcycle = h
        .licensing
        .applications
        .apply(&citizen, legacy(LicenseKind::Motorcycle))
        .await
        .unwrap();
    assert_eq!(motorcycle.kind(), LicenseKind::Motorcycle);
    assert_eq!(motorcycle.status(), LicenseStatus::Pending);

    let private = h
        .licensing
        .applications
        .apply(&citizen, legacy(LicenseKind::Private))
        .await;
    assert_eq!(kind_of(private), ErrorKind::Conflict);
}
