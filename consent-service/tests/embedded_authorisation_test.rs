mod common;

use common::{profile_with, spi_error, TestHarness, PSU_ID};
use consent_service::models::{
    AuthenticationObject, ChallengeData, ConsentStatus, MessageErrorCode, PsuIdData, ScaApproach,
    ScaStatus, UpdateConsentPsuDataRequest,
};
use consent_service::services::store::ConsentRepository;
use consent_service::spi::{
    SpiAuthorisationDecoupledScaResponse, SpiAuthorisationStatus, SpiAuthorizationCodeResult,
    SpiAvailableScaMethodsResponse, SpiPsuAuthorisationResponse,
};

fn embedded() -> TestHarness {
    TestHarness::with_profile(profile_with(ScaApproach::Embedded))
}

fn sms() -> AuthenticationObject {
    AuthenticationObject::new("SMS_OTP", "sms")
}

fn push() -> AuthenticationObject {
    let mut method = AuthenticationObject::new("PUSH_OTP", "push");
    method.decoupled = true;
    method
}

/// Consent with an implicit embedded authorisation.
async fn consent_with_authorisation(harness: &TestHarness) -> (String, String) {
    let created = harness.create_consent(false).await;
    let authorisation_id = created.authorisation_id.expect("authorisation id");
    (created.consent_id, authorisation_id)
}

fn update(consent_id: &str, authorisation_id: &str) -> UpdateConsentPsuDataRequest {
    UpdateConsentPsuDataRequest::new(consent_id, authorisation_id)
        .with_psu(PsuIdData::new(PSU_ID))
}

async fn consent_status(harness: &TestHarness, consent_id: &str) -> ConsentStatus {
    harness
        .repository
        .get_consent_by_id(consent_id)
        .await
        .unwrap()
        .unwrap()
        .status
}

#[tokio::test]
async fn implicit_embedded_authorisation_has_no_link() {
    let harness = embedded();
    let created = harness.create_consent(false).await;

    assert_eq!(created.sca_status, Some(ScaStatus::PsuIdentified));
    assert!(created.sca_redirect_link.is_none());
}

#[tokio::test]
async fn full_embedded_walk_with_method_choice() {
    let harness = embedded();
    let (consent_id, authorisation_id) = consent_with_authorisation(&harness).await;
    *harness.spi.methods.lock().unwrap() = Ok(SpiAvailableScaMethodsResponse {
        available_sca_methods: vec![sms(), push()],
    });
    *harness.spi.code.lock().unwrap() = Ok(SpiAuthorizationCodeResult {
        selected_sca_method: None,
        challenge_data: Some(ChallengeData {
            otp_max_length: Some(6),
            ..ChallengeData::default()
        }),
    });

    let mut ctx = harness.ctx();
    let authenticated = harness
        .service
        .update_consent_psu_data(
            &mut ctx,
            &update(&consent_id, &authorisation_id).with_password("12345"),
        )
        .await
        .unwrap();
    assert_eq!(authenticated.sca_status, ScaStatus::PsuAuthenticated);
    assert_eq!(authenticated.available_sca_methods, vec![sms(), push()]);

    let mut ctx = harness.ctx();
    let selected = harness
        .service
        .update_consent_psu_data(&mut ctx, &update(&consent_id, &authorisation_id).with_method("sms"))
        .await
        .unwrap();
    assert_eq!(selected.sca_status, ScaStatus::ScaMethodSelected);
    assert_eq!(selected.chosen_sca_method, Some(sms()));
    assert_eq!(
        selected.challenge_data.and_then(|c| c.otp_max_length),
        Some(6)
    );

    let mut ctx = harness.ctx();
    let finalised = harness
        .service
        .update_consent_psu_data(
            &mut ctx,
            &update(&consent_id, &authorisation_id).with_sca_data("123456"),
        )
        .await
        .unwrap();
    assert_eq!(finalised.sca_status, ScaStatus::Finalised);
    assert_eq!(finalised.consent_status, Some(ConsentStatus::Valid));
    assert_eq!(ctx.logging.sca_status(), Some(ScaStatus::Finalised));
    assert_eq!(ctx.logging.consent_status(), Some(ConsentStatus::Valid));

    assert_eq!(consent_status(&harness, &consent_id).await, ConsentStatus::Valid);
    assert_eq!(
        harness.spi.calls(),
        vec!["initiate", "authorise", "methods", "code", "verify"]
    );
    assert_eq!(
        harness.consent_data.get(&consent_id).await,
        Some(b"verify".to_vec())
    );
}

#[tokio::test]
async fn single_method_is_selected_automatically() {
    let harness = embedded();
    let (consent_id, authorisation_id) = consent_with_authorisation(&harness).await;
    *harness.spi.methods.lock().unwrap() = Ok(SpiAvailableScaMethodsResponse {
        available_sca_methods: vec![sms()],
    });

    let mut ctx = harness.ctx();
    let response = harness
        .service
        .update_consent_psu_data(
            &mut ctx,
            &update(&consent_id, &authorisation_id).with_password("12345"),
        )
        .await
        .unwrap();

    assert_eq!(response.sca_status, ScaStatus::ScaMethodSelected);
    assert_eq!(response.chosen_sca_method, Some(sms()));
    assert_eq!(harness.spi.count("code"), 1);
}

#[tokio::test]
async fn no_method_finalises_immediately() {
    let harness = embedded();
    let (consent_id, authorisation_id) = consent_with_authorisation(&harness).await;

    let mut ctx = harness.ctx();
    let response = harness
        .service
        .update_consent_psu_data(
            &mut ctx,
            &update(&consent_id, &authorisation_id).with_password("12345"),
        )
        .await
        .unwrap();

    assert_eq!(response.sca_status, ScaStatus::Finalised);
    assert_eq!(consent_status(&harness, &consent_id).await, ConsentStatus::Valid);
}

#[tokio::test]
async fn decoupled_method_starts_on_device() {
    let harness = embedded();
    let (consent_id, authorisation_id) = consent_with_authorisation(&harness).await;
    *harness.spi.methods.lock().unwrap() = Ok(SpiAvailableScaMethodsResponse {
        available_sca_methods: vec![sms(), push()],
    });
    *harness.spi.decoupled.lock().unwrap() = Ok(SpiAuthorisationDecoupledScaResponse {
        psu_message: Some("Confirm in your banking app".to_string()),
    });

    let mut ctx = harness.ctx();
    harness
        .service
        .update_consent_psu_data(
            &mut ctx,
            &update(&consent_id, &authorisation_id).with_password("12345"),
        )
        .await
        .unwrap();
    let response = harness
        .service
        .update_consent_psu_data(&mut ctx, &update(&consent_id, &authorisation_id).with_method("push"))
        .await
        .unwrap();

    assert_eq!(response.sca_status, ScaStatus::Started);
    assert_eq!(
        response.psu_message.as_deref(),
        Some("Confirm in your banking app")
    );
    assert_eq!(harness.spi.count("code"), 0);
}

#[tokio::test]
async fn unknown_method_is_rejected() {
    let harness = embedded();
    let (consent_id, authorisation_id) = consent_with_authorisation(&harness).await;
    *harness.spi.methods.lock().unwrap() = Ok(SpiAvailableScaMethodsResponse {
        available_sca_methods: vec![sms(), push()],
    });

    let mut ctx = harness.ctx();
    harness
        .service
        .update_consent_psu_data(
            &mut ctx,
            &update(&consent_id, &authorisation_id).with_password("12345"),
        )
        .await
        .unwrap();
    let error = harness
        .service
        .update_consent_psu_data(&mut ctx, &update(&consent_id, &authorisation_id).with_method("fax"))
        .await
        .unwrap_err();

    assert_eq!(error.error_type.status, 400);
    assert_eq!(error.code(), Some(MessageErrorCode::ScaMethodUnknown));
}

#[tokio::test]
async fn rejected_password_fails_authorisation_and_consent() {
    let harness = embedded();
    let (consent_id, authorisation_id) = consent_with_authorisation(&harness).await;
    *harness.spi.authorise.lock().unwrap() = Ok(SpiPsuAuthorisationResponse {
        status: SpiAuthorisationStatus::Failure,
        sca_exempted: false,
    });

    let mut ctx = harness.ctx();
    let error = harness
        .service
        .update_consent_psu_data(
            &mut ctx,
            &update(&consent_id, &authorisation_id).with_password("wrong"),
        )
        .await
        .unwrap_err();

    assert_eq!(error.error_type.status, 401);
    assert_eq!(error.code(), Some(MessageErrorCode::PsuCredentialsInvalid));

    let mut ctx = harness.ctx();
    let status = harness
        .service
        .get_consent_authorisation_sca_status(&mut ctx, &consent_id, &authorisation_id)
        .await
        .unwrap();
    assert_eq!(status, ScaStatus::Failed);
    assert_eq!(consent_status(&harness, &consent_id).await, ConsentStatus::Rejected);
}

#[tokio::test]
async fn exempted_psu_skips_sca() {
    let harness = embedded();
    let (consent_id, authorisation_id) = consent_with_authorisation(&harness).await;
    *harness.spi.authorise.lock().unwrap() = Ok(SpiPsuAuthorisationResponse {
        status: SpiAuthorisationStatus::Success,
        sca_exempted: true,
    });

    let mut ctx = harness.ctx();
    let response = harness
        .service
        .update_consent_psu_data(
            &mut ctx,
            &update(&consent_id, &authorisation_id).with_password("12345"),
        )
        .await
        .unwrap();

    assert_eq!(response.sca_status, ScaStatus::Exempted);
    assert_eq!(response.consent_status, Some(ConsentStatus::Valid));
    assert_eq!(harness.spi.count("methods"), 0);
}

#[tokio::test]
async fn failed_otp_verification_fails_authorisation() {
    let harness = embedded();
    let (consent_id, authorisation_id) = consent_with_authorisation(&harness).await;
    *harness.spi.methods.lock().unwrap() = Ok(SpiAvailableScaMethodsResponse {
        available_sca_methods: vec![sms()],
    });
    *harness.spi.verify.lock().unwrap() = Err(spi_error(MessageErrorCode::ScaInvalid));

    let mut ctx = harness.ctx();
    harness
        .service
        .update_consent_psu_data(
            &mut ctx,
            &update(&consent_id, &authorisation_id).with_password("12345"),
        )
        .await
        .unwrap();
    let error = harness
        .service
        .update_consent_psu_data(
            &mut ctx,
            &update(&consent_id, &authorisation_id).with_sca_data("000000"),
        )
        .await
        .unwrap_err();

    assert_eq!(error.code(), Some(MessageErrorCode::ScaInvalid));
    let mut ctx = harness.ctx();
    let status = harness
        .service
        .get_consent_authorisation_sca_status(&mut ctx, &consent_id, &authorisation_id)
        .await
        .unwrap();
    assert_eq!(status, ScaStatus::Failed);
    assert_eq!(
        harness.consent_data.get(&consent_id).await,
        Some(b"code".to_vec())
    );
}

#[tokio::test]
async fn confirmation_code_completes_mandated_confirmation() {
    let mut profile = profile_with(ScaApproach::Embedded);
    profile.authorisation_confirmation_request_mandated = true;
    let harness = TestHarness::with_profile(profile);
    let (consent_id, authorisation_id) = consent_with_authorisation(&harness).await;
    *harness.spi.methods.lock().unwrap() = Ok(SpiAvailableScaMethodsResponse {
        available_sca_methods: vec![sms()],
    });

    let mut ctx = harness.ctx();
    harness
        .service
        .update_consent_psu_data(
            &mut ctx,
            &update(&consent_id, &authorisation_id).with_password("12345"),
        )
        .await
        .unwrap();
    let unconfirmed = harness
        .service
        .update_consent_psu_data(
            &mut ctx,
            &update(&consent_id, &authorisation_id).with_sca_data("123456"),
        )
        .await
        .unwrap();
    assert_eq!(unconfirmed.sca_status, ScaStatus::Unconfirmed);
    assert_eq!(consent_status(&harness, &consent_id).await, ConsentStatus::Received);

    let confirmed = harness
        .service
        .update_consent_psu_data(
            &mut ctx,
            &UpdateConsentPsuDataRequest::new(&consent_id, &authorisation_id)
                .with_confirmation_code("conf-1"),
        )
        .await
        .unwrap();
    assert_eq!(confirmed.sca_status, ScaStatus::Finalised);
    assert_eq!(confirmed.consent_status, Some(ConsentStatus::Valid));
}

#[tokio::test]
async fn finalised_authorisation_cannot_be_updated() {
    let harness = embedded();
    let (consent_id, authorisation_id) = consent_with_authorisation(&harness).await;

    let mut ctx = harness.ctx();
    harness
        .service
        .update_consent_psu_data(
            &mut ctx,
            &update(&consent_id, &authorisation_id).with_password("12345"),
        )
        .await
        .unwrap();
    let error = harness
        .service
        .update_consent_psu_data(
            &mut ctx,
            &update(&consent_id, &authorisation_id).with_password("12345"),
        )
        .await
        .unwrap_err();

    assert_eq!(error.error_type.status, 409);
    assert_eq!(error.code(), Some(MessageErrorCode::StatusInvalid));
}

#[tokio::test]
async fn stage_without_required_data_is_format_error() {
    let harness = embedded();
    let (consent_id, authorisation_id) = consent_with_authorisation(&harness).await;
    *harness.spi.methods.lock().unwrap() = Ok(SpiAvailableScaMethodsResponse {
        available_sca_methods: vec![sms(), push()],
    });

    let mut ctx = harness.ctx();
    harness
        .service
        .update_consent_psu_data(
            &mut ctx,
            &update(&consent_id, &authorisation_id).with_password("12345"),
        )
        .await
        .unwrap();
    let error = harness
        .service
        .update_consent_psu_data(&mut ctx, &update(&consent_id, &authorisation_id))
        .await
        .unwrap_err();

    assert_eq!(error.code(), Some(MessageErrorCode::FormatError));
}

#[tokio::test]
async fn identification_moves_received_to_psu_identified() {
    let harness = embedded();
    let created = harness.create_consent(true).await;

    let mut ctx = harness.ctx();
    let started = harness
        .service
        .create_consent_authorisation(&mut ctx, &PsuIdData::default(), &created.consent_id)
        .await
        .unwrap();
    assert_eq!(started.sca_status, ScaStatus::Received);
    assert_eq!(started.chosen_sca_approach, ScaApproach::Embedded);

    let response = harness
        .service
        .update_consent_psu_data(&mut ctx, &update(&created.consent_id, &started.authorisation_id))
        .await
        .unwrap();

    assert_eq!(response.sca_status, ScaStatus::PsuIdentified);
    assert_eq!(harness.spi.count("authorise"), 0);
}

#[tokio::test]
async fn confirmation_on_received_authorisation_is_blocked() {
    let harness = embedded();
    let created = harness.create_consent(true).await;

    let mut ctx = harness.ctx();
    let started = harness
        .service
        .create_consent_authorisation(&mut ctx, &PsuIdData::default(), &created.consent_id)
        .await
        .unwrap();
    let error = harness
        .service
        .update_consent_psu_data(
            &mut ctx,
            &UpdateConsentPsuDataRequest::new(&created.consent_id, &started.authorisation_id)
                .with_confirmation_code("conf-1"),
        )
        .await
        .unwrap_err();

    assert_eq!(error.code(), Some(MessageErrorCode::ServiceBlocked));
    assert_eq!(harness.spi.count("confirmation"), 0);
}

#[tokio::test]
async fn foreign_psu_cannot_update_single_level_consent() {
    let harness = embedded();
    let (consent_id, authorisation_id) = consent_with_authorisation(&harness).await;

    let mut ctx = harness.ctx();
    let error = harness
        .service
        .update_consent_psu_data(
            &mut ctx,
            &UpdateConsentPsuDataRequest::new(&consent_id, &authorisation_id)
                .with_psu(PsuIdData::new("psu-mallory"))
                .with_password("12345"),
        )
        .await
        .unwrap_err();

    assert_eq!(error.error_type.status, 401);
    assert_eq!(error.code(), Some(MessageErrorCode::PsuCredentialsInvalid));
    assert_eq!(harness.spi.count("authorise"), 0);
}

#[tokio::test]
async fn unknown_authorisation_is_forbidden() {
    let harness = embedded();
    let (consent_id, _) = consent_with_authorisation(&harness).await;

    let mut ctx = harness.ctx();
    let error = harness
        .service
        .update_consent_psu_data(&mut ctx, &update(&consent_id, "missing").with_password("1"))
        .await
        .unwrap_err();

    assert_eq!(error.code(), Some(MessageErrorCode::ResourceUnknown403));
}

#[tokio::test]
async fn embedded_authorisation_cannot_be_completed_out_of_band() {
    let harness = embedded();
    let (consent_id, authorisation_id) = consent_with_authorisation(&harness).await;

    let mut ctx = harness.ctx();
    let error = harness
        .service
        .complete_authorisation(&mut ctx, &consent_id, &authorisation_id, ScaStatus::Finalised)
        .await
        .unwrap_err();

    assert_eq!(error.error_type.status, 405);
    assert_eq!(error.code(), Some(MessageErrorCode::ServiceInvalid405));
}

#[tokio::test]
async fn terminal_consent_cannot_start_authorisation() {
    let harness = embedded();
    let created = harness.create_consent(true).await;
    harness
        .repository
        .update_consent_status(&created.consent_id, ConsentStatus::RevokedByPsu)
        .await
        .unwrap();

    let mut ctx = harness.ctx();
    let error = harness
        .service
        .create_consent_authorisation(&mut ctx, &PsuIdData::new(PSU_ID), &created.consent_id)
        .await
        .unwrap_err();

    assert_eq!(error.code(), Some(MessageErrorCode::StatusInvalid));
}

#[tokio::test]
async fn deleted_consent_cannot_walk_embedded_sca() {
    let harness = embedded();
    let (consent_id, authorisation_id) = consent_with_authorisation(&harness).await;

    let mut ctx = harness.ctx();
    harness
        .service
        .delete_consent_by_id(&mut ctx, &PsuIdData::new(PSU_ID), &consent_id)
        .await
        .unwrap();

    let mut ctx = harness.ctx();
    let error = harness
        .service
        .update_consent_psu_data(
            &mut ctx,
            &update(&consent_id, &authorisation_id).with_password("12345"),
        )
        .await
        .unwrap_err();

    assert_eq!(error.error_type.status, 409);
    assert_eq!(error.code(), Some(MessageErrorCode::StatusInvalid));
    assert_eq!(harness.spi.count("authorise"), 0);
    assert_eq!(harness.spi.count("methods"), 0);
    assert_eq!(
        consent_status(&harness, &consent_id).await,
        ConsentStatus::TerminatedByTpp
    );

    let mut ctx = harness.ctx();
    let status = harness
        .service
        .get_consent_authorisation_sca_status(&mut ctx, &consent_id, &authorisation_id)
        .await
        .unwrap();
    assert_eq!(status, ScaStatus::PsuIdentified);
}
