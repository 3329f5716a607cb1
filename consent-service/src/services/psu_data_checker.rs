use crate::models::PsuIdData;

#[derive(Debug, Clone, Copy, Default)]
pub struct AuthorisationPsuDataChecker;

impl AuthorisationPsuDataChecker {
    /// Whether `supplied` is foreign to a single-level consent.
    ///
    /// For multilevel consents any PSU may authorise, so nothing is wrong here.
    pub fn is_psu_data_wrong(
        &self,
        multilevel_sca_required: bool,
        registered: &[PsuIdData],
        supplied: &PsuIdData,
    ) -> bool {
        if multilevel_sca_required {
            return false;
        }
        !registered.iter().any(|psu| psu.matches(supplied))
    }
}
