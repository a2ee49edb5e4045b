/// Configuration for [`crate::TimeseriesFactory`]
#[derive(Clone, Debug)]
pub struct FactoryConfig {
    /// Schema holding decompressed data points
    pub data_point_schema: String,
    /// Schema holding compressed segments (models)
    pub segment_schema: String,
    /// Namespace used by stores when the caller gives none
    pub keyspace: String,
    pub table_name: String,
    /// Rows per sink sub-batch
    pub insert_batch_size: usize,
    /// Partition count of the distributed-tabular representation
    pub partitions: usize,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            data_point_schema: "DataPoint".to_string(),
            segment_schema: "Segment".to_string(),
            keyspace: "moreutils".to_string(),
            table_name: "TIME_SERIES".to_string(),
            insert_batch_size: 750,
            partitions: 4,
        }
    }
}

impl FactoryConfig {
    pub fn with_keyspace(mut self, keyspace: impl Into<String>) -> Self {
        self.keyspace = keyspace.into();
        self
    }

    pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = table_name.into();
        self
    }

    pub fn with_insert_batch_size(mut self, insert_batch_size: usize) -> Self {
        self.insert_batch_size = insert_batch_size.max(1);
        self
    }

    pub fn with_partitions(mut self, partitions: usize) -> Self {
        self.partitions = partitions.max(1);
        self
    }
}
