use crate::core::resolution::Resolver;
use crate::utils::error::Result;
use serde::{Deserialize, Serialize};

pub const DURATION_COLUMN: &str = "Duration (Hours)";

/// Source-language keys of the billing export that the report depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSchema {
    pub project_id: String,
    pub resource_id: String,
    pub resource_name: String,
    pub resource_type: String,
    pub region: String,
    pub billing_method: String,
    pub configuration: String,
    pub order_type: String,
    pub order_start_time: String,
    pub order_end_time: String,
    /// 訂單原價，報表中改為重新計算的單價
    pub unit_price: String,
    /// 消費原價
    pub usage_total: String,
    /// Billing method code for flat monthly charges.
    pub monthly_value: String,
    /// Order type code for delete/refund events.
    pub delete_refund_value: String,
}

impl Default for SourceSchema {
    fn default() -> Self {
        Self {
            project_id: "项目".to_string(),
            resource_id: "资源ID".to_string(),
            resource_name: "标识".to_string(),
            resource_type: "资源类型".to_string(),
            region: "数据中心".to_string(),
            billing_method: "计费类型".to_string(),
            configuration: "配置".to_string(),
            order_type: "订单类型".to_string(),
            order_start_time: "订单起始时间".to_string(),
            order_end_time: "订单结束时间".to_string(),
            unit_price: "订单原价".to_string(),
            usage_total: "消费原价".to_string(),
            monthly_value: "按月".to_string(),
            delete_refund_value: "删除退费".to_string(),
        }
    }
}

/// Translated column names and codes the aggregation works with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportColumns {
    pub project_id: String,
    pub resource_id: String,
    pub resource_name: String,
    pub resource_type: String,
    pub region: String,
    pub billing_method: String,
    pub configuration: String,
    pub order_type: String,
    pub order_start_time: String,
    pub order_end_time: String,
    pub unit_price: String,
    pub usage_total: String,
    pub monthly_value: String,
    pub delete_refund_value: String,
}

impl ReportColumns {
    pub fn resolve(schema: &SourceSchema, resolver: &mut Resolver<'_>) -> Result<Self> {
        let columns = Self {
            project_id: resolver.header(&schema.project_id)?,
            resource_id: resolver.header(&schema.resource_id)?,
            resource_name: resolver.header(&schema.resource_name)?,
            resource_type: resolver.header(&schema.resource_type)?,
            region: resolver.header(&schema.region)?,
            billing_method: resolver.header(&schema.billing_method)?,
            configuration: resolver.header(&schema.configuration)?,
            order_type: resolver.header(&schema.order_type)?,
            order_start_time: resolver.header(&schema.order_start_time)?,
            order_end_time: resolver.header(&schema.order_end_time)?,
            unit_price: resolver.header(&schema.unit_price)?,
            usage_total: resolver.header(&schema.usage_total)?,
            monthly_value: resolver.value(&schema.billing_method, &schema.monthly_value)?,
            delete_refund_value: resolver
                .value(&schema.order_type, &schema.delete_refund_value)?,
        };

        tracing::debug!("Resolved report columns: {:?}", columns);
        Ok(columns)
    }

    /// Report headers in output order.
    pub fn report_headers(&self) -> Vec<String> {
        vec![
            self.project_id.clone(),
            self.resource_id.clone(),
            self.resource_name.clone(),
            self.resource_type.clone(),
            self.region.clone(),
            self.billing_method.clone(),
            self.configuration.clone(),
            self.order_start_time.clone(),
            self.order_end_time.clone(),
            DURATION_COLUMN.to_string(),
            self.unit_price.clone(),
            self.usage_total.clone(),
        ]
    }
}
