//! Model hosting endpoint configuration resource
//!
//! Endpoint configurations are immutable once created: every argument except
//! `tags` forces a new configuration. Names are either given, generated from
//! `name_prefix`, or fully generated.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tfrecon::naming::{self, UNIQUE_ID_SUFFIX_LENGTH};
use tfrecon::schema::Block;
use tfrecon::validator::{
    ArnValidator, NumberRangeValidator, OneOfValidator, StringLengthValidator,
    StringPatternValidator,
};
use tfrecon::{
    AttributeBuilder, AttributeType, BlockBuilder, ConfigConstraint, Context, CreateRequest,
    CreateResponse, DeleteRequest, Dynamic, DynamicValue, NestedBlock, NestingMode,
    ResourceDescriptor, ResourceOperations, Result, Schema, SchemaBuilder, State, TfreconError,
    UpdateRequest,
};

use super::{
    api_error, as_string_map, blocks, bool_field, first_block, int_field, number_field,
    opt_block, opt_bool, opt_int, opt_number, opt_string, opt_string_list, string_field,
    string_list_field, string_map, string_map_field,
};
use crate::api::sagemaker::{
    tags_from_map, AsyncInferenceClientConfig, AsyncInferenceConfig,
    AsyncInferenceNotificationConfig, AsyncInferenceOutputConfig, CaptureContentTypeHeader,
    CaptureOption, CoreDumpConfig, CreateEndpointConfigRequest, DataCaptureConfig,
    EndpointConfig, ManagedInstanceScaling, ProductionVariant, RoutingConfig, ServerlessConfig,
};
use crate::api::SageMakerApi;

pub const TYPE_NAME: &str = "cloudprov_sagemaker_endpoint_configuration";

const MAX_NAME_LENGTH: usize = 63;
const MAX_VARIANTS: usize = 10;

pub struct EndpointConfigurationResource {
    api: Arc<dyn SageMakerApi>,
}

impl EndpointConfigurationResource {
    pub fn new(api: Arc<dyn SageMakerApi>) -> Self {
        Self { api }
    }

    pub fn descriptor(api: Arc<dyn SageMakerApi>) -> ResourceDescriptor {
        ResourceDescriptor::new(TYPE_NAME, Self::schema(), "name", Arc::new(Self::new(api)))
    }

    pub fn schema() -> Schema {
        SchemaBuilder::new()
            .version(0)
            .description("Manages a model hosting endpoint configuration")
            .attribute(
                AttributeBuilder::new("arn", AttributeType::String)
                    .description("ARN of the endpoint configuration")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("Name of the endpoint configuration; generated when omitted")
                    .optional()
                    .computed()
                    .requires_replace()
                    .validator(StringLengthValidator::at_most(MAX_NAME_LENGTH))
                    .validator(StringPatternValidator::create(
                        r"^[a-zA-Z0-9](-*[a-zA-Z0-9])*$",
                        "alphanumerics and hyphens, starting and ending with an alphanumeric",
                    ))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name_prefix", AttributeType::String)
                    .description("Creates a unique name beginning with the given prefix")
                    .optional()
                    .computed()
                    .requires_replace()
                    .validator(StringLengthValidator::at_most(
                        MAX_NAME_LENGTH - UNIQUE_ID_SUFFIX_LENGTH,
                    ))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("kms_key_arn", AttributeType::String)
                    .description("KMS key used to encrypt storage attached to the instances")
                    .optional()
                    .requires_replace()
                    .validator(ArnValidator::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("tags", AttributeType::map_of(AttributeType::String))
                    .description("Tags assigned to the endpoint configuration")
                    .optional()
                    .build(),
            )
            .block(
                NestedBlock::new("production_variants", NestingMode::List, variant_block())
                    .min_items(1)
                    .max_items(MAX_VARIANTS)
                    .requires_replace(),
            )
            .block(
                NestedBlock::new(
                    "shadow_production_variants",
                    NestingMode::List,
                    variant_block(),
                )
                .max_items(MAX_VARIANTS)
                .requires_replace(),
            )
            .block(
                NestedBlock::new("data_capture_config", NestingMode::List, data_capture_block())
                    .max_items(1)
                    .requires_replace(),
            )
            .block(
                NestedBlock::new(
                    "async_inference_config",
                    NestingMode::List,
                    async_inference_block(),
                )
                .max_items(1)
                .requires_replace(),
            )
            .constraint(ConfigConstraint::ConflictsWith(vec![
                "name".to_string(),
                "name_prefix".to_string(),
            ]))
            .build()
    }
}

fn single(name: &str, block: Block) -> NestedBlock {
    NestedBlock::new(name, NestingMode::List, block)
        .max_items(1)
        .requires_replace()
}

fn optional_string(name: &str, description: &str) -> tfrecon::schema::Attribute {
    AttributeBuilder::new(name, AttributeType::String)
        .description(description)
        .optional()
        .build()
}

fn variant_block() -> Block {
    BlockBuilder::new()
        .attribute(
            AttributeBuilder::new("variant_name", AttributeType::String)
                .description("Name of the variant; generated when omitted")
                .optional()
                .computed()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("model_name", AttributeType::String)
                .description("Name of the model to host")
                .required()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("initial_instance_count", AttributeType::Number)
                .description("Initial number of instances used for auto-scaling")
                .optional()
                .validator(NumberRangeValidator::at_least(1.0))
                .build(),
        )
        .attribute(optional_string(
            "instance_type",
            "Type of instance to start",
        ))
        .attribute(
            AttributeBuilder::new("initial_variant_weight", AttributeType::Number)
                .description("Initial traffic distribution among variants")
                .optional()
                .computed()
                .validator(NumberRangeValidator::at_least(0.0))
                .build(),
        )
        .attribute(optional_string(
            "accelerator_type",
            "Size of the elastic inference accelerator to attach",
        ))
        .attribute(optional_string(
            "inference_ami_version",
            "Machine image version to run on the instances",
        ))
        .attribute(
            AttributeBuilder::new("volume_size_in_gb", AttributeType::Number)
                .description("Size of the storage volume attached to each instance")
                .optional()
                .computed()
                .validator(NumberRangeValidator::between(1.0, 512.0))
                .build(),
        )
        .attribute(
            AttributeBuilder::new("model_data_download_timeout_in_seconds", AttributeType::Number)
                .description("Timeout for downloading model data to the instances")
                .optional()
                .computed()
                .validator(NumberRangeValidator::between(60.0, 3600.0))
                .build(),
        )
        .attribute(
            AttributeBuilder::new(
                "container_startup_health_check_timeout_in_seconds",
                AttributeType::Number,
            )
            .description("Timeout for the inference container to pass its health check")
            .optional()
            .computed()
            .validator(NumberRangeValidator::between(60.0, 3600.0))
            .build(),
        )
        .attribute(
            AttributeBuilder::new("enable_ssm_access", AttributeType::Bool)
                .description("Whether session manager access to the variant is enabled")
                .optional()
                .default(tfrecon::defaults::StaticDefault::bool(false))
                .build(),
        )
        .block(single(
            "core_dump_config",
            BlockBuilder::new()
                .attribute(
                    AttributeBuilder::new("destination_s3_uri", AttributeType::String)
                        .required()
                        .validator(StringLengthValidator::at_most(512))
                        .build(),
                )
                .attribute(optional_string("kms_key_id", "Key used to encrypt core dumps"))
                .build(),
        ))
        .block(single(
            "serverless_config",
            BlockBuilder::new()
                .attribute(
                    AttributeBuilder::new("max_concurrency", AttributeType::Number)
                        .required()
                        .validator(NumberRangeValidator::between(1.0, 200.0))
                        .build(),
                )
                .attribute(
                    AttributeBuilder::new("memory_size_in_mb", AttributeType::Number)
                        .required()
                        .validator(NumberRangeValidator::between(1024.0, 6144.0))
                        .build(),
                )
                .attribute(
                    AttributeBuilder::new("provisioned_concurrency", AttributeType::Number)
                        .optional()
                        .validator(NumberRangeValidator::between(1.0, 200.0))
                        .build(),
                )
                .build(),
        ))
        .block(single(
            "routing_config",
            BlockBuilder::new()
                .attribute(
                    AttributeBuilder::new("routing_strategy", AttributeType::String)
                        .required()
                        .validator(OneOfValidator::create(&[
                            "LEAST_OUTSTANDING_REQUESTS",
                            "RANDOM",
                        ]))
                        .build(),
                )
                .build(),
        ))
        .block(single(
            "managed_instance_scaling",
            BlockBuilder::new()
                .attribute(
                    AttributeBuilder::new("status", AttributeType::String)
                        .optional()
                        .validator(OneOfValidator::create(&["ENABLED", "DISABLED"]))
                        .build(),
                )
                .attribute(
                    AttributeBuilder::new("min_instance_count", AttributeType::Number)
                        .optional()
                        .validator(NumberRangeValidator::at_least(0.0))
                        .build(),
                )
                .attribute(
                    AttributeBuilder::new("max_instance_count", AttributeType::Number)
                        .optional()
                        .validator(NumberRangeValidator::at_least(1.0))
                        .build(),
                )
                .build(),
        ))
        .constraint(ConfigConstraint::ConflictsWith(vec![
            "instance_type".to_string(),
            "serverless_config".to_string(),
        ]))
        .build()
}

fn data_capture_block() -> Block {
    let content_types = |name: &str| {
        AttributeBuilder::new(name, AttributeType::set_of(AttributeType::String))
            .optional()
            .build()
    };

    BlockBuilder::new()
        .attribute(
            AttributeBuilder::new("enable_capture", AttributeType::Bool)
                .optional()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("initial_sampling_percentage", AttributeType::Number)
                .required()
                .validator(NumberRangeValidator::between(0.0, 100.0))
                .build(),
        )
        .attribute(
            AttributeBuilder::new("destination_s3_uri", AttributeType::String)
                .required()
                .build(),
        )
        .attribute(optional_string("kms_key_id", "Key used to encrypt captured data"))
        .block(
            NestedBlock::new(
                "capture_options",
                NestingMode::List,
                BlockBuilder::new()
                    .attribute(
                        AttributeBuilder::new("capture_mode", AttributeType::String)
                            .required()
                            .validator(OneOfValidator::create(&[
                                "Input",
                                "Output",
                                "InputAndOutput",
                            ]))
                            .build(),
                    )
                    .build(),
            )
            .min_items(1)
            .max_items(2)
            .requires_replace(),
        )
        .block(single(
            "capture_content_type_header",
            BlockBuilder::new()
                .attribute(content_types("csv_content_types"))
                .attribute(content_types("json_content_types"))
                .constraint(ConfigConstraint::AtLeastOneOf(vec![
                    "csv_content_types".to_string(),
                    "json_content_types".to_string(),
                ]))
                .build(),
        ))
        .build()
}

fn async_inference_block() -> Block {
    let notification = BlockBuilder::new()
        .attribute(optional_string("error_topic", "Topic notified on failures"))
        .attribute(optional_string("success_topic", "Topic notified on success"))
        .attribute(
            AttributeBuilder::new(
                "include_inference_response_in",
                AttributeType::set_of(AttributeType::String),
            )
            .optional()
            .validator(OneOfValidator::create(&[
                "SUCCESS_NOTIFICATION_TOPIC",
                "ERROR_NOTIFICATION_TOPIC",
            ]))
            .build(),
        )
        .build();

    BlockBuilder::new()
        .block(single(
            "client_config",
            BlockBuilder::new()
                .attribute(
                    AttributeBuilder::new(
                        "max_concurrent_invocations_per_instance",
                        AttributeType::Number,
                    )
                    .optional()
                    .computed()
                    .validator(NumberRangeValidator::between(1.0, 1000.0))
                    .build(),
                )
                .build(),
        ))
        .block(
            single(
                "output_config",
                BlockBuilder::new()
                    .attribute(optional_string("s3_output_path", "Location for results"))
                    .attribute(optional_string("s3_failure_path", "Location for failures"))
                    .attribute(optional_string("kms_key_id", "Key used to encrypt results"))
                    .block(single("notification_config", notification))
                    .build(),
            )
            .min_items(1),
        )
        .build()
}

fn expand_variant(obj: &Dynamic) -> ProductionVariant {
    ProductionVariant {
        variant_name: string_field(obj, "variant_name").unwrap_or_else(naming::unique_id),
        model_name: string_field(obj, "model_name"),
        initial_instance_count: int_field(obj, "initial_instance_count"),
        instance_type: string_field(obj, "instance_type"),
        initial_variant_weight: number_field(obj, "initial_variant_weight"),
        accelerator_type: string_field(obj, "accelerator_type"),
        inference_ami_version: string_field(obj, "inference_ami_version"),
        volume_size_in_gb: int_field(obj, "volume_size_in_gb"),
        model_data_download_timeout_in_seconds: int_field(
            obj,
            "model_data_download_timeout_in_seconds",
        ),
        container_startup_health_check_timeout_in_seconds: int_field(
            obj,
            "container_startup_health_check_timeout_in_seconds",
        ),
        enable_ssm_access: bool_field(obj, "enable_ssm_access"),
        core_dump_config: first_block(obj, "core_dump_config").map(|b| CoreDumpConfig {
            destination_s3_uri: string_field(b, "destination_s3_uri").unwrap_or_default(),
            kms_key_id: string_field(b, "kms_key_id"),
        }),
        serverless_config: first_block(obj, "serverless_config").map(|b| ServerlessConfig {
            max_concurrency: int_field(b, "max_concurrency").unwrap_or_default(),
            memory_size_in_mb: int_field(b, "memory_size_in_mb").unwrap_or_default(),
            provisioned_concurrency: int_field(b, "provisioned_concurrency"),
        }),
        routing_config: first_block(obj, "routing_config").map(|b| RoutingConfig {
            routing_strategy: string_field(b, "routing_strategy").unwrap_or_default(),
        }),
        managed_instance_scaling: first_block(obj, "managed_instance_scaling").map(|b| {
            ManagedInstanceScaling {
                status: string_field(b, "status"),
                min_instance_count: int_field(b, "min_instance_count"),
                max_instance_count: int_field(b, "max_instance_count"),
            }
        }),
    }
}

fn flatten_variant(v: &ProductionVariant) -> Dynamic {
    Dynamic::object([
        ("variant_name", Dynamic::string(&v.variant_name)),
        ("model_name", opt_string(v.model_name.as_deref())),
        ("initial_instance_count", opt_int(v.initial_instance_count)),
        ("instance_type", opt_string(v.instance_type.as_deref())),
        ("initial_variant_weight", opt_number(v.initial_variant_weight)),
        ("accelerator_type", opt_string(v.accelerator_type.as_deref())),
        ("inference_ami_version", opt_string(v.inference_ami_version.as_deref())),
        ("volume_size_in_gb", opt_int(v.volume_size_in_gb)),
        (
            "model_data_download_timeout_in_seconds",
            opt_int(v.model_data_download_timeout_in_seconds),
        ),
        (
            "container_startup_health_check_timeout_in_seconds",
            opt_int(v.container_startup_health_check_timeout_in_seconds),
        ),
        // absent on configurations created before the flag existed
        ("enable_ssm_access", Dynamic::Bool(v.enable_ssm_access.unwrap_or(false))),
        (
            "core_dump_config",
            opt_block(v.core_dump_config.as_ref().map(|c| {
                Dynamic::object([
                    ("destination_s3_uri", Dynamic::string(&c.destination_s3_uri)),
                    ("kms_key_id", opt_string(c.kms_key_id.as_deref())),
                ])
            })),
        ),
        (
            "serverless_config",
            opt_block(v.serverless_config.as_ref().map(|c| {
                Dynamic::object([
                    ("max_concurrency", opt_int(Some(c.max_concurrency))),
                    ("memory_size_in_mb", opt_int(Some(c.memory_size_in_mb))),
                    ("provisioned_concurrency", opt_int(c.provisioned_concurrency)),
                ])
            })),
        ),
        (
            "routing_config",
            opt_block(v.routing_config.as_ref().map(|c| {
                Dynamic::object([("routing_strategy", Dynamic::string(&c.routing_strategy))])
            })),
        ),
        (
            "managed_instance_scaling",
            opt_block(v.managed_instance_scaling.as_ref().map(|c| {
                Dynamic::object([
                    ("status", opt_string(c.status.as_deref())),
                    ("min_instance_count", opt_int(c.min_instance_count)),
                    ("max_instance_count", opt_int(c.max_instance_count)),
                ])
            })),
        ),
    ])
}

fn expand_data_capture(obj: &Dynamic) -> DataCaptureConfig {
    DataCaptureConfig {
        enable_capture: bool_field(obj, "enable_capture"),
        initial_sampling_percentage: int_field(obj, "initial_sampling_percentage")
            .unwrap_or_default(),
        destination_s3_uri: string_field(obj, "destination_s3_uri").unwrap_or_default(),
        kms_key_id: string_field(obj, "kms_key_id"),
        capture_options: blocks(obj, "capture_options")
            .iter()
            .map(|o| CaptureOption {
                capture_mode: string_field(o, "capture_mode").unwrap_or_default(),
            })
            .collect(),
        capture_content_type_header: first_block(obj, "capture_content_type_header").map(|h| {
            CaptureContentTypeHeader {
                csv_content_types: string_list_field(h, "csv_content_types"),
                json_content_types: string_list_field(h, "json_content_types"),
            }
        }),
    }
}

fn flatten_data_capture(c: &DataCaptureConfig) -> Dynamic {
    Dynamic::object([
        ("enable_capture", opt_bool(c.enable_capture)),
        (
            "initial_sampling_percentage",
            opt_int(Some(c.initial_sampling_percentage)),
        ),
        ("destination_s3_uri", Dynamic::string(&c.destination_s3_uri)),
        ("kms_key_id", opt_string(c.kms_key_id.as_deref())),
        (
            "capture_options",
            Dynamic::List(
                c.capture_options
                    .iter()
                    .map(|o| Dynamic::object([("capture_mode", Dynamic::string(&o.capture_mode))]))
                    .collect(),
            ),
        ),
        (
            "capture_content_type_header",
            opt_block(c.capture_content_type_header.as_ref().map(|h| {
                Dynamic::object([
                    ("csv_content_types", opt_string_list(h.csv_content_types.as_ref())),
                    ("json_content_types", opt_string_list(h.json_content_types.as_ref())),
                ])
            })),
        ),
    ])
}

fn expand_async_inference(obj: &Dynamic) -> AsyncInferenceConfig {
    let output = first_block(obj, "output_config");
    AsyncInferenceConfig {
        client_config: first_block(obj, "client_config").map(|c| AsyncInferenceClientConfig {
            max_concurrent_invocations_per_instance: int_field(
                c,
                "max_concurrent_invocations_per_instance",
            ),
        }),
        output_config: AsyncInferenceOutputConfig {
            s3_output_path: output.and_then(|o| string_field(o, "s3_output_path")),
            s3_failure_path: output.and_then(|o| string_field(o, "s3_failure_path")),
            kms_key_id: output.and_then(|o| string_field(o, "kms_key_id")),
            notification_config: output
                .and_then(|o| first_block(o, "notification_config"))
                .map(|n| AsyncInferenceNotificationConfig {
                    error_topic: string_field(n, "error_topic"),
                    success_topic: string_field(n, "success_topic"),
                    include_inference_response_in: string_list_field(
                        n,
                        "include_inference_response_in",
                    ),
                }),
        },
    }
}

fn flatten_async_inference(c: &AsyncInferenceConfig) -> Dynamic {
    let output = &c.output_config;
    Dynamic::object([
        (
            "client_config",
            opt_block(c.client_config.as_ref().map(|cc| {
                Dynamic::object([(
                    "max_concurrent_invocations_per_instance",
                    opt_int(cc.max_concurrent_invocations_per_instance),
                )])
            })),
        ),
        (
            "output_config",
            opt_block(Some(Dynamic::object([
                ("s3_output_path", opt_string(output.s3_output_path.as_deref())),
                ("s3_failure_path", opt_string(output.s3_failure_path.as_deref())),
                ("kms_key_id", opt_string(output.kms_key_id.as_deref())),
                (
                    "notification_config",
                    opt_block(output.notification_config.as_ref().map(|n| {
                        Dynamic::object([
                            ("error_topic", opt_string(n.error_topic.as_deref())),
                            ("success_topic", opt_string(n.success_topic.as_deref())),
                            (
                                "include_inference_response_in",
                                opt_string_list(n.include_inference_response_in.as_ref()),
                            ),
                        ])
                    })),
                ),
            ]))),
        ),
    ])
}

fn expand_variants(config: &Dynamic, key: &str) -> Vec<ProductionVariant> {
    blocks(config, key).iter().map(expand_variant).collect()
}

fn flatten_variants(variants: &[ProductionVariant]) -> Dynamic {
    if variants.is_empty() {
        return Dynamic::Null;
    }
    Dynamic::List(variants.iter().map(flatten_variant).collect())
}

/// Builds the create request, resolving the configuration name
pub fn expand_config(config: &Dynamic) -> CreateEndpointConfigRequest {
    let name = naming::resolve_name(
        string_field(config, "name").as_deref(),
        string_field(config, "name_prefix").as_deref(),
    );

    CreateEndpointConfigRequest {
        endpoint_config_name: name,
        production_variants: expand_variants(config, "production_variants"),
        shadow_production_variants: expand_variants(config, "shadow_production_variants"),
        data_capture_config: first_block(config, "data_capture_config").map(expand_data_capture),
        async_inference_config: first_block(config, "async_inference_config")
            .map(expand_async_inference),
        kms_key_id: string_field(config, "kms_key_arn"),
        tags: tags_from_map(&string_map_field(config, "tags")),
    }
}

/// Observed state of a described configuration and its tags
pub fn flatten_config(config: &EndpointConfig, tags: &HashMap<String, String>) -> State {
    let name = &config.endpoint_config_name;
    DynamicValue::new(Dynamic::object([
        ("arn", Dynamic::string(&config.endpoint_config_arn)),
        ("name", Dynamic::string(name)),
        (
            "name_prefix",
            opt_string(naming::name_prefix_from_name(name).as_deref()),
        ),
        ("kms_key_arn", opt_string(config.kms_key_id.as_deref())),
        ("tags", string_map(tags)),
        (
            "production_variants",
            flatten_variants(&config.production_variants),
        ),
        (
            "shadow_production_variants",
            flatten_variants(&config.shadow_production_variants),
        ),
        (
            "data_capture_config",
            opt_block(config.data_capture_config.as_ref().map(flatten_data_capture)),
        ),
        (
            "async_inference_config",
            opt_block(
                config
                    .async_inference_config
                    .as_ref()
                    .map(flatten_async_inference),
            ),
        ),
    ]))
}

#[async_trait]
impl ResourceOperations for EndpointConfigurationResource {
    async fn create(&self, _ctx: Context, request: CreateRequest) -> Result<CreateResponse> {
        let input = expand_config(&request.config.value);
        let name = input.endpoint_config_name.clone();

        tracing::debug!("Creating endpoint configuration {}", name);
        let arn = self
            .api
            .create_endpoint_config(&input)
            .await
            .map_err(|e| api_error(TYPE_NAME, &name, e))?;

        tracing::info!("Created endpoint configuration {} ({})", name, arn);
        Ok(CreateResponse { id: name })
    }

    async fn find(&self, _ctx: Context, id: &str) -> Result<Option<State>> {
        let config = match self.api.describe_endpoint_config(id).await {
            Ok(config) => config,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(api_error(TYPE_NAME, id, e)),
        };

        let tags = match self.api.list_tags(&config.endpoint_config_arn).await {
            Ok(tags) => tags,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(api_error(TYPE_NAME, id, e)),
        };

        Ok(Some(flatten_config(&config, &tags)))
    }

    async fn update(&self, _ctx: Context, request: UpdateRequest) -> Result<()> {
        let arn = request
            .prior_state
            .attr("arn")
            .as_string()
            .map(str::to_string)
            .ok_or_else(|| {
                TfreconError::InvalidState(format!("{} {} has no arn", TYPE_NAME, request.id))
            })?;

        if let Some(change) = request.changes.iter().find(|c| c.attribute != "tags") {
            return Err(TfreconError::InvalidState(format!(
                "{} {}: {} cannot be changed in place",
                TYPE_NAME, request.id, change.attribute
            )));
        }

        for change in &request.changes {
            let old = as_string_map(&change.old);
            let new = as_string_map(&change.new);

            let mut removed: Vec<String> = old
                .keys()
                .filter(|k| !new.contains_key(*k))
                .cloned()
                .collect();
            removed.sort();
            let upserted: HashMap<String, String> = new
                .into_iter()
                .filter(|(k, v)| old.get(k) != Some(v))
                .collect();

            if !removed.is_empty() {
                tracing::debug!("Removing tags {:?} from {}", removed, arn);
                self.api
                    .delete_tags(&arn, &removed)
                    .await
                    .map_err(|e| api_error(TYPE_NAME, &request.id, e))?;
            }
            if !upserted.is_empty() {
                tracing::debug!("Setting {} tags on {}", upserted.len(), arn);
                self.api
                    .add_tags(&arn, &upserted)
                    .await
                    .map_err(|e| api_error(TYPE_NAME, &request.id, e))?;
            }
        }
        Ok(())
    }

    async fn delete(&self, _ctx: Context, request: DeleteRequest) -> Result<()> {
        tracing::debug!("Deleting endpoint configuration {}", request.id);
        self.api
            .delete_endpoint_config(&request.id)
            .await
            .map_err(|e| api_error(TYPE_NAME, &request.id, e))
    }
}
