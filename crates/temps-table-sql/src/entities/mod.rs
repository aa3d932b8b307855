pub mod table_template_shares;
pub mod table_templates;
