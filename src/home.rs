//! Doctor profiles for the home page

use crate::error::Result;
use crate::gateway::Gateway;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoctorProfile {
    pub name: String,
    pub expertise: String,
    pub info: String,
    pub image: Option<String>,
}

pub async fn doctor_directory(gateway: &dyn Gateway) -> Result<Vec<DoctorProfile>> {
    let doctors = gateway.get_all_doctors().await?;
    Ok(doctors
        .into_iter()
        .map(|d| DoctorProfile {
            name: d.name,
            expertise: d.doctor_expertise,
            info: d.doctor_info.unwrap_or_default(),
            image: d.image,
        })
        .collect())
}
