//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 内置的实体类型目录。
//!
//! 这些域全部位于默认命名空间，使用规范编码 `oi:1:<EntityType>:`。

use crate::backend::BackendId;
use crate::registry::DomainSpec;

/// (域名, 实体类型)
pub const BUILTIN_ENTITY_TYPES: &[(&str, &str)] = &[
    ("services_pricelist", "ServicesPricelist"),
    ("location", "Location"),
    ("claim_admin", "ClaimAdmin"),
    ("feedback", "Feedback"),
    ("claim", "Claim"),
    ("feedback_prompt", "FeedbackPrompt"),
    ("claim_item", "ClaimItem"),
    ("claim_attachment_type", "ClaimAttachmentType"),
    ("claim_attachment", "ClaimAttachment"),
    ("claim_service", "ClaimService"),
    ("claim_ded_rem", "ClaimDedRem"),
    ("premium", "Premium"),
    ("history_business_model", "HistoryBusinessModel"),
    ("role", "Role"),
    ("role_right", "RoleRight"),
    ("interactive_user", "InteractiveUser"),
    ("user_role", "UserRole"),
    ("user", "User"),
    ("officer", "Officer"),
    ("cheque_import", "ChequeImport"),
    ("cheque_import_line", "ChequeImportLine"),
    ("cheque_updated_history", "ChequeUpdatedHistory"),
    ("individual", "Individual"),
    ("individual_data_source_upload", "IndividualDataSourceUpload"),
    ("individual_data_source", "IndividualDataSource"),
    ("group", "Group"),
    ("group_individual", "GroupIndividual"),
    ("insuree_photo", "InsureePhoto"),
    ("family", "Family"),
    ("insuree_status_reason", "InsureeStatusReason"),
    ("insuree", "Insuree"),
    ("insuree_policy", "InsureePolicy"),
    ("policy_renewal_detail", "PolicyRenewalDetail"),
    ("health_facility", "HealthFacility"),
    ("user_district", "UserDistrict"),
    ("officer_village", "OfficerVillage"),
    ("diagnosis", "Diagnosis"),
    ("item", "Item"),
    ("service", "Service"),
    ("policy", "Policy"),
    ("policy_renewal", "PolicyRenewal"),
    ("product", "Product"),
    ("product_item", "ProductItem"),
    ("product_service", "ProductService"),
    ("extract", "Extract"),
];

/// 目录中的全部域，均无数据源访问器
pub fn builtin_domains() -> impl Iterator<Item = DomainSpec> {
    BUILTIN_ENTITY_TYPES.iter().map(|(name, entity_type)| {
        DomainSpec::new(*name, BackendId::Default).entity_type(*entity_type)
    })
}
